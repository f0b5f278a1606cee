use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common_auth::{Clock, SystemClock};
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::config::RateLimitSettings;
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub window_reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub attempts: u32,
    pub window_reset_at: DateTime<Utc>,
}

/// Fixed-window attempt counter keyed by an opaque identifier.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check(&self, identifier: &str, max_attempts: u32, window_ms: u64) -> Result<RateDecision>;
    async fn reset(&self, identifier: &str) -> Result<()>;
}

// ---------------- In-Memory Implementation ----------------

/// Single-process store. One lock guards the whole map so each
/// read-modify-write is atomic.
#[derive(Clone, Debug)]
pub struct InMemoryRateLimitStore {
    inner: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Drop records whose window has passed. Never runs on its own.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.inner.lock().await;
        let before = guard.len();
        guard.retain(|_, record| now <= record.window_reset_at);
        before - guard.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn record(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.inner.lock().await.get(identifier).copied()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn check(&self, identifier: &str, max_attempts: u32, window_ms: u64) -> Result<RateDecision> {
        let mut guard = self.inner.lock().await;
        let now = self.clock.now();

        match guard.get_mut(identifier) {
            Some(record) if now <= record.window_reset_at => {
                if record.attempts >= max_attempts {
                    return Ok(RateDecision {
                        allowed: false,
                        remaining: 0,
                        window_reset_at: record.window_reset_at,
                    });
                }
                record.attempts += 1;
                Ok(RateDecision {
                    allowed: true,
                    remaining: max_attempts.saturating_sub(record.attempts),
                    window_reset_at: record.window_reset_at,
                })
            }
            _ => {
                let record = RateLimitRecord {
                    attempts: 1,
                    window_reset_at: window_end(now, window_ms),
                };
                guard.insert(identifier.to_string(), record);
                Ok(RateDecision {
                    allowed: true,
                    remaining: max_attempts.saturating_sub(1),
                    window_reset_at: record.window_reset_at,
                })
            }
        }
    }

    async fn reset(&self, identifier: &str) -> Result<()> {
        self.inner.lock().await.remove(identifier);
        Ok(())
    }
}

fn window_end(now: DateTime<Utc>, window_ms: u64) -> DateTime<Utc> {
    let window = Duration::milliseconds(i64::try_from(window_ms).unwrap_or(i64::MAX));
    now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Applies the configured limits to a store. Store failures deny the attempt.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    pub async fn check(&self, identifier: &str) -> Result<RateDecision, AuthError> {
        self.store
            .check(identifier, self.settings.max_attempts, self.settings.window_ms)
            .await
            .map_err(|err| {
                error!(identifier = %identifier, error = %err, "rate limit store failed; denying attempt");
                AuthError::Unavailable(err.to_string())
            })
    }

    /// Clear the counter after a successful login. A failure here is logged only.
    pub async fn reset(&self, identifier: &str) {
        if let Err(err) = self.store.reset(identifier).await {
            warn!(identifier = %identifier, error = %err, "failed to reset rate limit counter");
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
