//! Read-through prediction service.
//!
//! [`PredictionService::predict`] derives a cache key, returns a cached price
//! when one exists, and otherwise asks the [`InferenceProvider`] and stores
//! the answer for later. The cache never decides the outcome: with the cache
//! down, every call simply recomputes.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::CacheStore;
use crate::features::{FeatureRecord, KeyDeriver};
use crate::inference::{InferenceError, InferenceProvider, ModelInput};

/// Request field names that differ from the model's feature names.
pub const PROVIDER_FIELD_RENAMES: &[(&str, &str)] = &[("torque", "torque_nm")];

/// Translates a request field name into the model's name for it.
pub fn provider_field_name(field: &'static str) -> &'static str {
    PROVIDER_FIELD_RENAMES
        .iter()
        .find(|(from, _)| *from == field)
        .map(|(_, to)| *to)
        .unwrap_or(field)
}

/// Builds the model input for `record`, renaming fields and leaving values as-is.
pub fn to_model_input(record: &FeatureRecord) -> ModelInput {
    let mut input = ModelInput::new();
    for (name, value) in record.fields() {
        input.insert(provider_field_name(name), value);
    }
    input
}

/// Orchestrates key derivation, cache lookup, inference and cache fill.
pub struct PredictionService {
    keys: KeyDeriver,
    cache: CacheStore,
    provider: Arc<dyn InferenceProvider>,
    ttl: Duration,
}

impl PredictionService {
    pub fn new(
        keys: KeyDeriver,
        cache: CacheStore,
        provider: Arc<dyn InferenceProvider>,
        ttl: Duration,
    ) -> Self {
        Self {
            keys,
            cache,
            provider,
            ttl,
        }
    }

    /// Name of the cache backend in use.
    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend_name()
    }

    /// Returns the raw model price for `record`.
    ///
    /// A cached `0.0` counts as a miss and is recomputed.
    ///
    /// # Errors
    ///
    /// Only inference failures are returned; cache failures are absorbed.
    pub async fn predict(&self, record: &FeatureRecord) -> Result<f64, InferenceError> {
        let key = self.keys.derive(record);

        match self.cache.get(&key).await {
            Some(cached) if cached != 0.0 => return Ok(cached),
            Some(_) => debug!(key = %key, "cached zero prediction, recomputing"),
            None => {}
        }

        let raw = self.provider.predict(&to_model_input(record)).await?;
        self.cache.set(&key, raw, self.ttl).await;
        Ok(raw)
    }
}
