use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type TokenResult<T> = Result<T, TokenError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("session token missing")]
    Missing,
    #[error("session token expired")]
    Expired,
    #[error("session token invalid: {0}")]
    Invalid(String),
    #[error("invalid token lifetime '{0}'")]
    InvalidTtl(String),
    #[error("failed to sign session token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Coarse reason exposed to callers. Everything that is neither missing
    /// nor expired collapses into `Invalid`.
    pub fn reason(&self) -> FailureReason {
        match self {
            TokenError::Missing => FailureReason::Missing,
            TokenError::Expired => FailureReason::Expired,
            TokenError::Invalid(_) | TokenError::InvalidTtl(_) | TokenError::Signing(_) => {
                FailureReason::Invalid
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Invalid(value.to_string())
    }
}

/// Why a session was rejected. Only used for logging and UX; every variant denies access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    Expired,
    Invalid,
    Missing,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Expired => "expired",
            FailureReason::Invalid => "invalid",
            FailureReason::Missing => "missing",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
