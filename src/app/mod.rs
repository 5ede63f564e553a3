//! Application assembly: shared state and the HTTP surface built on it.
//!
//! [`AppState`] is constructed once at startup and shared with every handler
//! behind an [`Arc`]. It owns the process-wide singletons (the cache
//! connection and the inference provider), both of which initialize lazily on
//! first use. Request metrics are recorded per instance rather than into a
//! process-global recorder, so independent instances never share counters.

mod routes;

pub use routes::{LoginRequest, LoginResponse, build_pipeline};

use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use serde::Serialize;

use crate::cache::{CacheBackend, CacheStore, backend_for_url};
use crate::config::Settings;
use crate::features::KeyDeriver;
use crate::inference::{ArtifactProvider, InferenceProvider};
use crate::prediction::PredictionService;
use crate::security::{ApiKeyValidator, AuthGate, TokenIssuer, TokenValidator};

/// Body of a successful `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictResponse {
    pub predicted_price: f64,
    pub currency: String,
}

/// Converts raw model output into the reported currency.
#[derive(Debug, Clone)]
pub struct PriceConverter {
    rate: f64,
    precision: u32,
    currency: String,
}

impl PriceConverter {
    pub fn new(rate: f64, precision: u32, currency: impl Into<String>) -> Self {
        Self {
            rate,
            precision,
            currency: currency.into(),
        }
    }

    /// Divides `raw` by the exchange rate and rounds half away from zero.
    pub fn quote(&self, raw: f64) -> PredictResponse {
        let scale = 10f64.powi(self.precision as i32);
        PredictResponse {
            predicted_price: (raw / self.rate * scale).round() / scale,
            currency: self.currency.clone(),
        }
    }
}

/// Everything request handlers need, built once per process.
pub struct AppState {
    pub settings: Settings,
    pub gate: Arc<AuthGate>,
    pub issuer: TokenIssuer,
    pub prediction: PredictionService,
    pub converter: PriceConverter,
    /// Request metrics recorded by this instance, rendered at `GET /metrics`.
    pub metrics: PrometheusHandle,
    recorder: Arc<PrometheusRecorder>,
}

impl AppState {
    /// Builds the state with the cache backend and model chosen by `settings`.
    ///
    /// Nothing is connected or loaded here.
    pub fn from_settings(settings: Settings) -> Self {
        let backend = backend_for_url(&settings.redis_url);
        let provider = Arc::new(ArtifactProvider::new(settings.model_path.clone()));
        Self::new(settings, backend, provider)
    }

    /// The recorder every request of this instance is counted into.
    pub fn recorder(&self) -> Arc<PrometheusRecorder> {
        Arc::clone(&self.recorder)
    }

    /// Builds the state around an explicit cache backend and provider.
    pub fn new(
        settings: Settings,
        backend: Arc<dyn CacheBackend>,
        provider: Arc<dyn InferenceProvider>,
    ) -> Self {
        let gate = AuthGate::new(
            TokenValidator::new(&settings.jwt_secret),
            ApiKeyValidator::new(settings.api_key.clone()),
        );
        let issuer = TokenIssuer::new(
            &settings.jwt_secret,
            settings.token_lifetime,
            settings.auth_username.clone(),
            settings.auth_password.clone(),
        );

        let keys = match &settings.cache_key_separator {
            Some(separator) => KeyDeriver::new().with_separator(separator.clone()),
            None => KeyDeriver::new(),
        };
        let prediction = PredictionService::new(
            keys,
            CacheStore::new(backend, settings.cache_timeout),
            provider,
            settings.cache_ttl,
        );
        let converter = PriceConverter::new(
            settings.exchange_rate,
            settings.price_precision,
            settings.currency.clone(),
        );

        let recorder = PrometheusBuilder::new().build_recorder();
        let metrics = recorder.handle();

        Self {
            settings,
            gate: Arc::new(gate),
            issuer,
            prediction,
            converter,
            metrics,
            recorder: Arc::new(recorder),
        }
    }
}
