//! Redis cache backend.

use std::time::Duration;

use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use super::backend::{CacheBackend, CacheError};

/// Redis-backed cache using one process-wide multiplexed connection.
///
/// The connection is established lazily on the first cache operation and
/// shared by every request afterwards. Concurrent first use initializes it
/// once; a failed attempt leaves the cell empty so a later request can try
/// again.
pub struct RedisBackend {
    url: String,
    conn: OnceCell<ConnectionManager>,
}

impl RedisBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let client = ::redis::Client::open(self.url.as_str())?;
                let manager = client.get_connection_manager().await?;
                info!("redis connection established");
                Ok::<_, CacheError>(manager)
            })
            .await?;
        // ConnectionManager is a cheap handle onto the shared multiplexed connection.
        Ok(conn.clone())
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_is_an_error_not_a_panic() {
        let backend = RedisBackend::new("not a redis url");
        assert!(matches!(
            backend.get("k").await,
            Err(CacheError::Redis(_))
        ));
        // The failed attempt is not memoized.
        assert!(backend.conn.get().is_none());
    }
}
