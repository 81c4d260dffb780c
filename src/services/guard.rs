//! Brute-force login guard.
//!
//! Failed attempts are counted per submitted email in a sliding window
//! (INCR + EXPIRE on every increment, so the window tracks the most
//! recent failure). Attempts against unknown emails are
//! counted too, so probing costs the same whether or not the account
//! exists. Crossing the threshold sets a lockout flag keyed by user id
//! whose TTL is the lockout duration.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::services::cache::VolatileStore;
use crate::utils::security::{account_lockout_key, login_attempts_key};

#[derive(Clone)]
pub struct LoginGuard {
    cache: Arc<dyn VolatileStore>,
    max_attempts: u32,
    window_seconds: u64,
    lockout_seconds: u64,
}

impl LoginGuard {
    pub fn new(cache: Arc<dyn VolatileStore>, config: &SecurityConfig) -> Self {
        Self {
            cache,
            max_attempts: config.max_login_attempts,
            window_seconds: config.login_attempts_window_minutes * 60,
            lockout_seconds: config.account_lockout_duration_minutes * 60,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn lockout_seconds(&self) -> u64 {
        self.lockout_seconds
    }

    /// Count a failed attempt and return the running total within the
    /// window. Every failure pushes the window's expiry out again.
    pub async fn record_failure(&self, email: &str) -> Result<u32, anyhow::Error> {
        let key = login_attempts_key(email);
        let count = self.cache.incr(&key).await?;
        self.cache.expire(&key, self.window_seconds).await?;
        Ok(count.max(0) as u32)
    }

    pub async fn clear_attempts(&self, email: &str) -> Result<(), anyhow::Error> {
        self.cache.del(&login_attempts_key(email)).await
    }

    pub async fn is_locked(&self, user_id: Uuid) -> Result<bool, anyhow::Error> {
        Ok(self
            .cache
            .get(&account_lockout_key(user_id))
            .await?
            .is_some())
    }

    /// Remaining lockout in seconds, falling back to the configured
    /// duration when the flag exists but its TTL is unreadable.
    pub async fn lockout_remaining(&self, user_id: Uuid) -> Result<u64, anyhow::Error> {
        Ok(self
            .cache
            .ttl(&account_lockout_key(user_id))
            .await?
            .unwrap_or(self.lockout_seconds))
    }

    pub async fn lock(&self, user_id: Uuid) -> Result<(), anyhow::Error> {
        self.cache
            .set_ex(&account_lockout_key(user_id), "locked", self.lockout_seconds)
            .await
    }

    pub async fn unlock(&self, user_id: Uuid) -> Result<(), anyhow::Error> {
        self.cache.del(&account_lockout_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;

    fn guard(cache: Arc<MemoryCache>) -> LoginGuard {
        LoginGuard::new(cache, &SecurityConfig::default())
    }

    #[tokio::test]
    async fn failures_count_up_within_the_window() {
        let cache = Arc::new(MemoryCache::new());
        let guard = guard(cache);
        assert_eq!(guard.record_failure("a@example.com").await.unwrap(), 1);
        assert_eq!(guard.record_failure("a@example.com").await.unwrap(), 2);
        // Separate identifier has its own counter.
        assert_eq!(guard.record_failure("b@example.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_resets_the_counter() {
        let cache = Arc::new(MemoryCache::new());
        let guard = guard(cache);
        guard.record_failure("a@example.com").await.unwrap();
        guard.record_failure("a@example.com").await.unwrap();
        guard.clear_attempts("a@example.com").await.unwrap();
        assert_eq!(guard.record_failure("a@example.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn each_failure_extends_the_window() {
        let cache = Arc::new(MemoryCache::new());
        let guard = guard(cache.clone());
        let key = login_attempts_key("a@example.com");

        guard.record_failure("a@example.com").await.unwrap();
        // Shrink the window artificially; the next failure must push the
        // expiry back out to the full window.
        cache.expire(&key, 1).await.unwrap();
        guard.record_failure("a@example.com").await.unwrap();
        assert!(cache.ttl(&key).await.unwrap().unwrap() > 1);
    }

    #[tokio::test]
    async fn window_expiry_restarts_the_count() {
        let cache = Arc::new(MemoryCache::new());
        let guard = guard(cache.clone());
        guard.record_failure("a@example.com").await.unwrap();
        guard.record_failure("a@example.com").await.unwrap();
        cache.expire_now(&login_attempts_key("a@example.com"));
        assert_eq!(guard.record_failure("a@example.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lock_and_unlock_round_trip() {
        let cache = Arc::new(MemoryCache::new());
        let guard = guard(cache);
        let user_id = Uuid::new_v4();
        assert!(!guard.is_locked(user_id).await.unwrap());

        guard.lock(user_id).await.unwrap();
        assert!(guard.is_locked(user_id).await.unwrap());
        let remaining = guard.lockout_remaining(user_id).await.unwrap();
        assert!(remaining > 0 && remaining <= guard.lockout_seconds());

        guard.unlock(user_id).await.unwrap();
        assert!(!guard.is_locked(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn lockout_expires_on_its_own() {
        let cache = Arc::new(MemoryCache::new());
        let guard = guard(cache.clone());
        let user_id = Uuid::new_v4();
        guard.lock(user_id).await.unwrap();
        cache.expire_now(&account_lockout_key(user_id));
        assert!(!guard.is_locked(user_id).await.unwrap());
    }
}
