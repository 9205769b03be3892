//! Replay/verification cache: keyed store of verified signatures with TTL.
//!
//! Two implementations behind one [`VerificationCache`] trait: an in-memory
//! map with lazy expiration on access, and a durable Redis-backed store with
//! native key TTL. The `Verifier` never depends on which is in use.

use crate::types::{CacheEntry, VerificationOutcome};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Default TTL, in seconds, applied when a caller doesn't specify one.
pub const DEFAULT_TTL_SECONDS: i64 = 600;

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Keyed store of verified transaction-signature -> verdict, with TTL.
#[async_trait]
pub trait VerificationCache: Send + Sync {
    /// Returns the cached entry for `signature`, if present and not expired.
    async fn get(&self, signature: &str) -> crate::errors::Result<Option<CacheEntry>>;

    /// Stores `outcome` under `signature`, expiring after `ttl_seconds`.
    async fn put(&self, signature: &str, outcome: VerificationOutcome, ttl_seconds: i64) -> crate::errors::Result<()>;

    /// Whether a non-expired entry exists for `signature`.
    async fn has(&self, signature: &str) -> crate::errors::Result<bool> {
        Ok(self.get(signature).await?.is_some())
    }

    /// Removes any cached entry for `signature`.
    async fn delete(&self, signature: &str) -> crate::errors::Result<()>;
}

/// In-memory [`VerificationCache`] backed by a concurrent hash map.
///
/// Expiration is lazy: entries are only evicted when looked up past their
/// `expires_at`. Safe to share across tasks via `Arc`.
#[derive(Default)]
pub struct InMemoryVerificationCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryVerificationCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new cache in an `Arc`, the shape `Verifier` expects for injection.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl VerificationCache for InMemoryVerificationCache {
    async fn get(&self, signature: &str) -> crate::errors::Result<Option<CacheEntry>> {
        let now = now_unix();
        if let Some(entry) = self.entries.get(signature) {
            if entry.is_live(now) {
                return Ok(Some(entry.clone()));
            }
        }
        self.entries.remove(signature);
        Ok(None)
    }

    async fn put(&self, signature: &str, outcome: VerificationOutcome, ttl_seconds: i64) -> crate::errors::Result<()> {
        let expires_at = now_unix() + ttl_seconds;
        self.entries.insert(signature.to_string(), CacheEntry { outcome, expires_at });
        Ok(())
    }

    async fn delete(&self, signature: &str) -> crate::errors::Result<()> {
        self.entries.remove(signature);
        Ok(())
    }
}

/// Durable [`VerificationCache`] backed by Redis, under the `redis` feature.
///
/// Keys live in the `verif:sig:<signature>` namespace with native Redis TTL
/// (`SET ... EX`), so expired entries require no lazy-scan cleanup.
#[cfg(feature = "redis")]
pub mod redis_backend {
    use super::*;
    use redis::AsyncCommands;

    fn key_for(signature: &str) -> String {
        format!("verif:sig:{signature}")
    }

    /// A [`VerificationCache`] backed by a Redis connection manager.
    pub struct RedisVerificationCache {
        conn: redis::aio::ConnectionManager,
    }

    impl RedisVerificationCache {
        /// Connects to `redis_url` and wraps the connection for concurrent use.
        pub async fn connect(redis_url: &str) -> crate::errors::Result<Self> {
            let client = redis::Client::open(redis_url)?;
            let conn = client.get_connection_manager().await?;
            Ok(RedisVerificationCache { conn })
        }
    }

    #[async_trait]
    impl VerificationCache for RedisVerificationCache {
        async fn get(&self, signature: &str) -> crate::errors::Result<Option<CacheEntry>> {
            let mut conn = self.conn.clone();
            let raw: Option<String> = conn.get(key_for(signature)).await?;
            match raw {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        }

        async fn put(&self, signature: &str, outcome: VerificationOutcome, ttl_seconds: i64) -> crate::errors::Result<()> {
            let entry = CacheEntry {
                outcome,
                expires_at: now_unix() + ttl_seconds,
            };
            let json = serde_json::to_string(&entry)?;
            let mut conn = self.conn.clone();
            let ttl = ttl_seconds.max(1) as u64;
            let _: () = conn.set_ex(key_for(signature), json, ttl).await?;
            Ok(())
        }

        async fn delete(&self, signature: &str) -> crate::errors::Result<()> {
            let mut conn = self.conn.clone();
            let _: () = conn.del(key_for(signature)).await?;
            Ok(())
        }
    }
}

#[cfg(feature = "redis")]
pub use redis_backend::RedisVerificationCache;
