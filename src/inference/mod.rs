//! Inference: the price model behind the cache.
//!
//! The rest of the crate only sees [`InferenceProvider`]: something that
//! turns a [`ModelInput`] into a number. The production provider,
//! [`ArtifactProvider`], loads a fitted regression pipeline from disk the
//! first time it is asked for a prediction and keeps it for the life of the
//! process.

mod artifact;

pub use artifact::{CategoricalFeature, ModelArtifact, NumericFeature};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::features::FieldValue;

/// Failures producing a prediction. Always fatal to the request.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model input is missing feature `{0}`")]
    MissingFeature(String),

    #[error("feature `{feature}` must be {expected}")]
    InvalidFeature {
        feature: String,
        expected: &'static str,
    },

    #[error("model produced a non-finite prediction ({0})")]
    NonFinite(f64),
}

/// A record keyed by the model's own feature names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInput {
    fields: Vec<(&'static str, FieldValue)>,
}

impl ModelInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.fields.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Black-box price model.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn predict(&self, input: &ModelInput) -> Result<f64, InferenceError>;
}

/// Provider backed by a JSON model artifact on disk, loaded on first use.
pub struct ArtifactProvider {
    path: PathBuf,
    model: OnceCell<ModelArtifact>,
    load_attempts: AtomicUsize,
}

impl ArtifactProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            model: OnceCell::new(),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// A provider whose model is already in memory.
    pub fn preloaded(model: ModelArtifact) -> Self {
        Self {
            path: PathBuf::new(),
            model: OnceCell::new_with(Some(model)),
            load_attempts: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` once the artifact has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// How many times the artifact has been read from disk, failed reads
    /// included.
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::Relaxed)
    }

    async fn model(&self) -> Result<&ModelArtifact, InferenceError> {
        self.model
            .get_or_try_init(|| async {
                self.load_attempts.fetch_add(1, Ordering::Relaxed);
                let model = ModelArtifact::load(&self.path).await?;
                info!(path = %self.path.display(), "model artifact loaded");
                Ok(model)
            })
            .await
    }
}

#[async_trait]
impl InferenceProvider for ArtifactProvider {
    async fn predict(&self, input: &ModelInput) -> Result<f64, InferenceError> {
        self.model().await?.predict(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn artifact() -> ModelArtifact {
        ModelArtifact {
            intercept: 100.0,
            numeric: vec![NumericFeature {
                name: "torque_nm".into(),
                mean: 100.0,
                scale: 10.0,
                weight: 5.0,
            }],
            categorical: vec![CategoricalFeature {
                name: "fuel".into(),
                weights: HashMap::from([("Diesel".to_owned(), 20.0)]),
            }],
        }
    }

    fn input(torque: f64, fuel: &str) -> ModelInput {
        let mut input = ModelInput::new();
        input.insert("torque_nm", FieldValue::Float(torque));
        input.insert("fuel", FieldValue::Text(fuel.into()));
        input
    }

    fn temp_artifact(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "carprice-{name}-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn model_input_lookup() {
        let input = input(120.0, "Petrol");
        assert_eq!(input.len(), 2);
        assert_eq!(input.get("torque_nm"), Some(&FieldValue::Float(120.0)));
        assert_eq!(input.get("torque"), None);
    }

    #[tokio::test]
    async fn preloaded_provider_predicts() {
        let provider = ArtifactProvider::preloaded(artifact());
        assert!(provider.is_loaded());
        assert_eq!(provider.load_attempts(), 0);
        // 100 + 5 * (120 - 100) / 10 + 20
        assert_eq!(provider.predict(&input(120.0, "Diesel")).await.unwrap(), 130.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn loads_lazily_and_once() {
        let json = serde_json::to_string(&artifact()).unwrap();
        let path = temp_artifact("lazy", &json);
        let provider = Arc::new(ArtifactProvider::new(&path));
        assert!(!provider.is_loaded());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                tokio::spawn(async move { provider.predict(&input(100.0, "Petrol")).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 100.0);
        }
        assert!(provider.is_loaded());
        assert_eq!(provider.load_attempts(), 1);

        // The loaded model is reused even after the artifact disappears.
        std::fs::remove_file(&path).unwrap();
        assert_eq!(provider.predict(&input(110.0, "Petrol")).await.unwrap(), 105.0);
        assert_eq!(provider.load_attempts(), 1);
    }

    #[tokio::test]
    async fn missing_artifact_is_an_inference_error() {
        let provider = ArtifactProvider::new("/nonexistent/carprice/model.json");
        let err = provider.predict(&input(1.0, "Petrol")).await.unwrap_err();
        assert!(matches!(err, InferenceError::Read { .. }));
        assert!(!provider.is_loaded());

        // A failed load is retried on the next call.
        assert!(provider.predict(&input(1.0, "Petrol")).await.is_err());
        assert_eq!(provider.load_attempts(), 2);
    }

    #[tokio::test]
    async fn malformed_artifact_is_an_inference_error() {
        let path = temp_artifact("malformed", "{\"intercept\": \"high\"}");
        let provider = ArtifactProvider::new(&path);
        let err = provider.predict(&input(1.0, "Petrol")).await.unwrap_err();
        assert!(matches!(err, InferenceError::Malformed { .. }));
        std::fs::remove_file(&path).unwrap();
    }
}
