//! Prediction cache: a best-effort key-value store in front of the model.
//!
//! The cache is an optimization, never a correctness dependency. Callers go
//! through [`CacheStore`], which turns every backend failure (unreachable
//! server, timeout, unparseable payload) into a miss on read and a no-op on
//! write, logging it at `warn`.
//!
//! | Backend | Selected by `REDIS_URL` |
//! |---------|-------------------------|
//! | [`RedisBackend`] | any `redis://` / `rediss://` URL |
//! | [`MemoryBackend`] | `memory://` |
//! | [`DisabledBackend`] | empty string |

mod backend;
mod redis;
mod store;

pub use self::backend::{CacheBackend, CacheError, DisabledBackend, MemoryBackend};
pub use self::redis::RedisBackend;
pub use self::store::CacheStore;

use std::sync::Arc;

/// URL that selects the in-process backend.
pub const MEMORY_URL: &str = "memory://";

/// Picks a backend for the configured cache URL.
///
/// No connection is attempted here; the Redis backend connects lazily on
/// first use.
pub fn backend_for_url(url: &str) -> Arc<dyn CacheBackend> {
    match url.trim() {
        "" => Arc::new(DisabledBackend),
        MEMORY_URL => Arc::new(MemoryBackend::new()),
        url => Arc::new(RedisBackend::new(url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_selects_backend() {
        assert_eq!(backend_for_url("").name(), "disabled");
        assert_eq!(backend_for_url("memory://").name(), "memory");
        assert_eq!(backend_for_url("redis://localhost:6379").name(), "redis");
    }
}
