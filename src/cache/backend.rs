//! Cache backend trait and the in-process implementations.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Failures reaching or reading from a cache backend.
///
/// [`CacheStore`](super::CacheStore) absorbs all of these; they only ever
/// surface in logs.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cached payload is not a number: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Raw byte-level access to a key-value cache with expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// `GET key`. `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// `SETEX key ttl value`.
    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    fn name(&self) -> &'static str;
}

struct Entry {
    data: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache with per-entry expiry.
///
/// Expired entries are dropped lazily when read or when a write finds them.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.data.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_owned(),
            Entry {
                data: value.to_vec(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Backend used when caching is switched off: every read misses.
pub struct DisabledBackend;

#[async_trait]
impl CacheBackend for DisabledBackend {
    async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set_ex(&self, _: &str, _: &[u8], _: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_stores_until_expiry() {
        let backend = MemoryBackend::new();
        backend
            .set_ex("k", b"42.5", Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(b"42.5".to_vec()));
        assert_eq!(backend.len().await, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert_eq!(backend.len().await, 0);
    }

    #[tokio::test]
    async fn memory_backend_overwrites() {
        let backend = MemoryBackend::new();
        let ttl = Duration::from_secs(60);
        backend.set_ex("k", b"1", ttl).await.unwrap();
        backend.set_ex("k", b"2", ttl).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn disabled_backend_always_misses() {
        let backend = DisabledBackend;
        backend
            .set_ex("k", b"1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }
}
