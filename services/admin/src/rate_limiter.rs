//! Per-IP login attempt limiter
//!
//! Each source IP owns a counter of remaining attempts. Every write refreshes
//! the counter's TTL, so the lock window restarts on each failure; once the
//! TTL lapses the IP is treated as never seen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use common::cache::RedisPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Limiter configuration
#[derive(Debug, Clone)]
pub struct LoginLimitConfig {
    /// Attempts allowed inside one lock window
    pub max_attempts: i32,
    /// Lifetime of a counter after its last write
    pub lock_duration: Duration,
}

impl Default for LoginLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_duration: Duration::from_secs(30 * 60),
        }
    }
}

/// Key/value storage for attempt counters
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Current counter, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<i32>>;

    /// Store a counter that expires after `ttl`
    async fn set(&self, key: &str, remaining: i32, ttl: Duration) -> Result<()>;
}

#[derive(Debug)]
struct AttemptEntry {
    remaining: i32,
    expires_at: Instant,
}

/// Process-local [`AttemptStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryAttemptStore {
    entries: Arc<Mutex<HashMap<String, AttemptEntry>>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries, returning how many were removed
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of entries currently held, expired or not
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `cancel` fires
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Attempt store sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.sweep().await;
                        if removed > 0 {
                            debug!(removed, "Swept expired attempt counters");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn get(&self, key: &str) -> Result<Option<i32>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.remaining))
    }

    async fn set(&self, key: &str, remaining: i32, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            AttemptEntry {
                remaining,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

/// [`AttemptStore`] shared between instances through Redis
#[derive(Clone)]
pub struct RedisAttemptStore {
    pool: RedisPool,
}

impl RedisAttemptStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn get(&self, key: &str) -> Result<Option<i32>> {
        match self.pool.get(key).await? {
            Some(value) => Ok(Some(value.parse()?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, remaining: i32, ttl: Duration) -> Result<()> {
        self.pool
            .set(key, &remaining.to_string(), Some(ttl.as_secs()))
            .await
    }
}

#[derive(Error, Debug)]
pub enum LimiterError {
    #[error("login attempt check cancelled")]
    Cancelled,

    #[error("attempt store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Login attempt limiter
#[derive(Clone)]
pub struct LoginAttemptLimiter {
    config: LoginLimitConfig,
    store: Arc<dyn AttemptStore>,
}

impl LoginAttemptLimiter {
    pub fn new(config: LoginLimitConfig, store: Arc<dyn AttemptStore>) -> Self {
        Self { config, store }
    }

    fn key(ip: &str) -> String {
        format!("login_attempts:{ip}")
    }

    fn check(cancel: &CancellationToken) -> Result<(), LimiterError> {
        if cancel.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }
        Ok(())
    }

    /// Remaining attempts for `ip`; an unseen IP has the full allowance
    pub async fn remaining(&self, cancel: &CancellationToken, ip: &str) -> Result<i32, LimiterError> {
        Self::check(cancel)?;
        let remaining = self.store.get(&Self::key(ip)).await?;
        Ok(remaining.unwrap_or(self.config.max_attempts))
    }

    /// Store `remaining` for `ip`, restarting its lock window
    pub async fn set_remaining(
        &self,
        cancel: &CancellationToken,
        ip: &str,
        remaining: i32,
    ) -> Result<(), LimiterError> {
        Self::check(cancel)?;
        self.store
            .set(&Self::key(ip), remaining, self.config.lock_duration)
            .await?;
        Ok(())
    }

    /// Count one failure against the value read before verification
    pub async fn record_failure(
        &self,
        cancel: &CancellationToken,
        ip: &str,
        current: i32,
    ) -> Result<i32, LimiterError> {
        let remaining = current - 1;
        self.set_remaining(cancel, ip, remaining).await?;
        if self.is_locked(remaining) {
            warn!(ip, "Login attempts exhausted, locking");
        }
        Ok(remaining)
    }

    /// Restore the full allowance after a successful login
    pub async fn reset(&self, cancel: &CancellationToken, ip: &str) -> Result<(), LimiterError> {
        self.set_remaining(cancel, ip, self.config.max_attempts).await
    }

    pub fn is_locked(&self, remaining: i32) -> bool {
        remaining <= 0
    }

    pub fn config(&self) -> &LoginLimitConfig {
        &self.config
    }
}
