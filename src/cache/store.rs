//! Failure-absorbing prediction cache.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::backend::{CacheBackend, CacheError};
use crate::features::CacheKey;

/// Reads and writes predictions as JSON numbers through a [`CacheBackend`].
///
/// Neither operation can fail from the caller's point of view. Each backend
/// call gets one attempt bounded by `timeout`; running out of time is
/// handled exactly like a backend error.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Returns the cached value, or `None` on absence or any failure.
    pub async fn get(&self, key: &CacheKey) -> Option<f64> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Writes `value` with expiry `ttl`. Failures are logged and dropped.
    pub async fn set(&self, key: &CacheKey, value: f64, ttl: Duration) {
        if let Err(e) = self.try_set(key, value, ttl).await {
            warn!(backend = self.backend.name(), error = %e, "cache write failed, skipping");
        }
    }

    async fn try_get(&self, key: &CacheKey) -> Result<Option<f64>, CacheError> {
        let raw = tokio::time::timeout(self.timeout, self.backend.get(key.as_str()))
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))??;

        let Some(bytes) = raw else {
            debug!(key = %key, "cache miss");
            return Ok(None);
        };
        let value = serde_json::from_slice::<f64>(&bytes).map_err(CacheError::Payload)?;
        debug!(key = %key, "cache hit");
        Ok(Some(value))
    }

    async fn try_set(&self, key: &CacheKey, value: f64, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_vec(&value).map_err(CacheError::Payload)?;
        tokio::time::timeout(self.timeout, self.backend.set_ex(key.as_str(), &payload, ttl))
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use async_trait::async_trait;

    const TTL: Duration = Duration::from_secs(3600);

    struct Broken;

    #[async_trait]
    impl CacheBackend for Broken {
        async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set_ex(&self, _: &str, _: &[u8], _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    struct Stalled;

    #[async_trait]
    impl CacheBackend for Stalled {
        async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, CacheError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some(b"1.0".to_vec()))
        }

        async fn set_ex(&self, _: &str, _: &[u8], _: Duration) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    fn store(backend: Arc<dyn CacheBackend>) -> CacheStore {
        CacheStore::new(backend, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn round_trips_json_numbers() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = store(backend.clone());
        let key = CacheKey::new("k");

        assert_eq!(cache.get(&key).await, None);
        cache.set(&key, 512345.67, TTL).await;
        assert_eq!(cache.get(&key).await, Some(512345.67));
        assert_eq!(
            backend.get("k").await.unwrap(),
            Some(b"512345.67".to_vec())
        );
    }

    #[tokio::test]
    async fn accepts_integer_payloads() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_ex("k", b"1000", TTL).await.unwrap();
        assert_eq!(store(backend).get(&CacheKey::new("k")).await, Some(1000.0));
    }

    #[tokio::test]
    async fn unparseable_payload_is_a_miss() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .set_ex("k", br#"{"price": 1}"#, TTL)
            .await
            .unwrap();
        assert_eq!(store(backend).get(&CacheKey::new("k")).await, None);
    }

    #[tokio::test]
    async fn backend_errors_degrade_silently() {
        let cache = store(Arc::new(Broken));
        let key = CacheKey::new("k");
        cache.set(&key, 1.0, TTL).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn timeouts_degrade_like_errors() {
        let cache = store(Arc::new(Stalled));
        let key = CacheKey::new("k");

        let started = tokio::time::Instant::now();
        assert_eq!(cache.get(&key).await, None);
        cache.set(&key, 1.0, TTL).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
