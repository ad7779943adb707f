//! Failed-login throttling
//!
//! Counts failed logins per key (the normalized email). Reaching
//! `max_attempts` failures inside `window_seconds` locks the key for
//! `ban_duration_seconds`; a successful login resets it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failures allowed before the key is locked
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Lock duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            ban_duration_seconds: 900,
        }
    }
}

#[derive(Debug)]
struct FailureEntry {
    failures: u32,
    window_started: Instant,
    ban_expires: Option<Instant>,
}

impl FailureEntry {
    /// Neither a running window nor an active lock remains.
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.ban_expires {
            Some(expires) => now >= expires,
            None => now.duration_since(self.window_started) >= window,
        }
    }
}

/// Rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, FailureEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `key` is currently locked out. Expired locks are cleared.
    pub async fn is_locked(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(ban_expires) = entries.get(key).map(|e| e.ban_expires) else {
            return false;
        };

        match ban_expires {
            Some(expires) if Instant::now() < expires => true,
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    /// Record a failed attempt; returns `true` when this failure triggered a lock.
    pub async fn record_failure(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(now, window));
        if entries.len() < before {
            debug!("Pruned {} stale login counters", before - entries.len());
        }

        let entry = entries.entry(key.to_string()).or_insert(FailureEntry {
            failures: 0,
            window_started: now,
            ban_expires: None,
        });

        if now.duration_since(entry.window_started) >= window {
            entry.failures = 0;
            entry.window_started = now;
        }

        entry.failures += 1;
        if entry.failures >= self.config.max_attempts && entry.ban_expires.is_none() {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Locked logins for {} for {} seconds after {} failures",
                key, self.config.ban_duration_seconds, entry.failures
            );
            return true;
        }

        false
    }

    pub async fn reset(&self, key: &str) {
        if self.entries.lock().await.remove(key).is_some() {
            info!("Cleared failed login counter for {}", key);
        }
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}
