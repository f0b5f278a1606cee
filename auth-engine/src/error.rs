use chrono::{DateTime, Utc};
use common_auth::TokenError;
use thiserror::Error;

const MINUTE_MS: i64 = 60_000;

/// Every problem found while resolving configuration, reported together.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid authentication configuration: {}", .violations.join("; "))]
pub struct ConfigError {
    pub violations: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("Too many attempts. Try again in {retry_after_minutes} minutes.")]
    Throttled {
        retry_after_minutes: i64,
        window_reset_at: DateTime<Utc>,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AuthError {
    /// Throttled error with the retry estimate rounded up to whole minutes.
    pub fn throttled(window_reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining_ms = (window_reset_at - now).num_milliseconds().max(0);
        let retry_after_minutes = (remaining_ms + MINUTE_MS - 1) / MINUTE_MS;
        AuthError::Throttled {
            retry_after_minutes,
            window_reset_at,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "configuration",
            AuthError::Throttled { .. } => "throttled",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Unavailable(_) => "unavailable",
            AuthError::Token(_) => "token",
        }
    }
}
