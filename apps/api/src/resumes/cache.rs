//! Ephemeral cache tier, keyed by a content hash of `(identity, profile_url)`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, RedisResult};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

const CACHE_KEY_PREFIX: &str = "resume:";

/// Deterministic, collision-resistant key for an identity/profile pair.
///
/// Each component is length-prefixed before hashing so `("a_b", "c")` and
/// `("a", "b_c")` never share a key.
pub fn cache_key(identity: &str, profile_url: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [identity, profile_url] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{CACHE_KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Storage seam for the ephemeral tier. Failures here are never fatal to a request.
#[async_trait]
pub trait ResumeCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn put(&self, key: &str, document: &Value) -> Result<()>;
}

/// Redis-backed cache. Entries never expire unless a TTL is configured.
///
/// One multiplexed connection is opened on first use and shared by every
/// clone. It is dropped after a Redis error so the next call reconnects.
#[derive(Clone)]
pub struct RedisResumeCache {
    client: redis::Client,
    ttl: Option<Duration>,
    conn: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisResumeCache {
    pub fn new(client: redis::Client, ttl: Option<Duration>) -> Self {
        Self {
            client,
            ttl,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    async fn connection(&self) -> RedisResult<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        debug!("Opened Redis connection for the resume cache");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn forget_connection(&self, err: RedisError) -> RedisError {
        *self.conn.lock().await = None;
        err
    }
}

#[async_trait]
impl ResumeCache for RedisResumeCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(err) => return Err(self.forget_connection(err).await.into()),
        };
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(Into::into)
    }

    async fn put(&self, key: &str, document: &Value) -> Result<()> {
        let payload = serde_json::to_string(document)?;
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload);
        if let Some(ttl) = self.ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        if let Err(err) = cmd.query_async::<_, ()>(&mut conn).await {
            return Err(self.forget_connection(err).await.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        assert_eq!(
            cache_key("123", "https://linkedin.com/in/x"),
            cache_key("123", "https://linkedin.com/in/x")
        );
    }

    #[test]
    fn test_key_shape() {
        let key = cache_key("123", "u");
        assert!(key.starts_with("resume:"));
        assert_eq!(key.len(), "resume:".len() + 64);
    }

    #[test]
    fn test_component_boundaries_matter() {
        assert_ne!(cache_key("a_b", "c"), cache_key("a", "b_c"));
        assert_ne!(cache_key("ab", ""), cache_key("a", "b"));
    }

    #[test]
    fn test_identity_is_part_of_key() {
        assert_ne!(cache_key("111", "u"), cache_key("222", "u"));
    }

    #[tokio::test]
    async fn test_unreachable_redis_errors_without_keeping_a_connection() {
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let cache = RedisResumeCache::new(client, None);

        for _ in 0..2 {
            assert!(cache.get("resume:k").await.is_err());
            assert!(cache.put("resume:k", &serde_json::json!({})).await.is_err());
        }
        assert!(cache.conn.lock().await.is_none());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_round_trip_reuses_one_connection() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let client = redis::Client::open(url).unwrap();
        let cache = RedisResumeCache::new(client, Some(Duration::from_secs(60)));
        let key = cache_key("round-trip", "https://linkedin.com/in/x");
        let document = serde_json::json!({"name": "Ada"});

        cache.put(&key, &document).await.unwrap();
        assert!(cache.conn.lock().await.is_some());
        let clone = cache.clone();
        assert_eq!(clone.get(&key).await.unwrap(), Some(document));
        assert!(Arc::ptr_eq(&cache.conn, &clone.conn));
    }
}
