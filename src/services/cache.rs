//! Volatile key/value store behind a trait so handlers and tests can run
//! against an in-memory double.
//!
//! Everything short-lived lives here: login-attempt counters, lockout
//! flags, one-time tokens and their reverse index, and the refresh-token
//! mirror. Every entry carries a TTL; nothing in this store is
//! authoritative for account data.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

use crate::config::RedisConfig;

#[async_trait]
pub trait VolatileStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;

    /// Set `key` to `value` with a TTL. Overwrites any existing entry and
    /// resets its expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), anyhow::Error>;

    /// Atomically increment a counter, creating it at 1 with no TTL.
    async fn incr(&self, key: &str) -> Result<i64, anyhow::Error>;

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), anyhow::Error>;

    async fn del(&self, key: &str) -> Result<(), anyhow::Error>;

    /// Remaining TTL in seconds, or `None` when the key does not exist or
    /// has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisCache {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn new(config: &RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects automatically on dropped connections
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl VolatileStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get key: {}", e))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to set key: {}", e))
    }

    async fn incr(&self, key: &str) -> Result<i64, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to increment key: {}", e))
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to set expiry: {}", e))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete key: {}", e))?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let ttl: i64 = redis::cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read TTL: {}", e))?;
        // -2 means the key does not exist, -1 means no expiry
        if ttl > 0 {
            Ok(Some(ttl as u64))
        } else {
            Ok(None)
        }
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// In-memory double that honors TTLs against a real clock. Expired entries
/// are dropped lazily on access, matching Redis semantics closely enough
/// for the suite.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a key's expiry in the past, so tests can simulate TTL
    /// passage without sleeping.
    pub fn expire_now(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() - Duration::from_secs(1));
        }
    }
}

#[async_trait]
impl VolatileStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), anyhow::Error> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, anyhow::Error> {
        let mut entries = self.entries.lock().unwrap();
        if entries.get(key).is_some_and(Entry::expired) {
            entries.remove(key);
        }
        match entries.get_mut(key) {
            Some(entry) => {
                let next = entry
                    .value
                    .parse::<i64>()
                    .map_err(|_| anyhow::anyhow!("Value is not an integer"))?
                    + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), anyhow::Error> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            if !entry.expired() {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_seconds));
            }
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), anyhow::Error> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, anyhow::Error> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(entry
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now()).as_secs())),
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get_round_trip() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert!(cache.ttl("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_keys_read_as_absent() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", 60).await.unwrap();
        cache.expire_now("k");
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_counts_from_one_without_ttl() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("attempts").await.unwrap(), 1);
        assert_eq!(cache.incr("attempts").await.unwrap(), 2);
        assert_eq!(cache.ttl("attempts").await.unwrap(), None);

        cache.expire("attempts", 60).await.unwrap();
        assert!(cache.ttl("attempts").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_counter_restarts() {
        let cache = MemoryCache::new();
        cache.incr("attempts").await.unwrap();
        cache.incr("attempts").await.unwrap();
        cache.expire("attempts", 60).await.unwrap();
        cache.expire_now("attempts");
        assert_eq!(cache.incr("attempts").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn del_removes_entry() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", 60).await.unwrap();
        cache.del("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
