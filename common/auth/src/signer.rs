use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common_crypto::SecretKey;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use tracing::debug;

use crate::claims::{SessionClaims, EXPIRES_AT_CLAIM, ISSUED_AT_CLAIM};
use crate::clock::{Clock, SystemClock};
use crate::error::{FailureReason, TokenError, TokenResult};
use crate::ttl::parse_ttl;

// Largest magnitude chrono::Duration::seconds accepts.
const MAX_TTL_SECONDS: u64 = (i64::MAX / 1_000) as u64;

/// Outcome of checking a (possibly absent) session token.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Valid(SessionClaims),
    Invalid(FailureReason),
}

impl SessionStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionStatus::Valid(_))
    }

    pub fn claims(&self) -> Option<&SessionClaims> {
        match self {
            SessionStatus::Valid(claims) => Some(claims),
            SessionStatus::Invalid(_) => None,
        }
    }

    pub fn into_claims(self) -> Option<SessionClaims> {
        match self {
            SessionStatus::Valid(claims) => Some(claims),
            SessionStatus::Invalid(_) => None,
        }
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            SessionStatus::Valid(_) => None,
            SessionStatus::Invalid(reason) => Some(*reason),
        }
    }
}

/// HS256 signer/verifier for compact session tokens.
///
/// Tokens are `base64url(header).base64url(payload).base64url(signature)` with
/// header `{"alg":"HS256"}`. Only HS256 is accepted on verification.
#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    fingerprint: String,
    clock: Arc<dyn Clock>,
}

impl SessionTokens {
    pub fn new(key: &SecretKey) -> Self {
        Self::with_clock(key, Arc::new(SystemClock))
    }

    pub fn with_clock(key: &SecretKey, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(key.as_bytes()),
            decoding: DecodingKey::from_secret(key.as_bytes()),
            validation: pinned_validation(),
            fingerprint: key.fingerprint(),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Sign `payload` with a lifetime expressed in the TTL grammar.
    pub fn sign(&self, payload: Map<String, Value>, ttl: &str) -> TokenResult<String> {
        let ttl_seconds = parse_ttl(ttl)?;
        self.sign_for_seconds(payload, ttl_seconds)
    }

    /// Sign `payload` valid for `ttl_seconds` (zero or negative is already expired).
    pub fn sign_for_seconds(
        &self,
        mut payload: Map<String, Value>,
        ttl_seconds: i64,
    ) -> TokenResult<String> {
        let now = self.clock.now();
        let expires_at = expiry_after(now, ttl_seconds)?;
        payload.insert(ISSUED_AT_CLAIM.to_string(), Value::from(now.timestamp()));
        payload.insert(EXPIRES_AT_CLAIM.to_string(), Value::from(expires_at.timestamp()));

        let mut header = Header::new(Algorithm::HS256);
        header.typ = None;

        encode(&header, &payload, &self.encoding).map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// Verify signature first, expiry second.
    ///
    /// Structural problems, a foreign algorithm or a bad signature are all
    /// `Invalid`; `Expired` is only reported for an authentic token.
    pub fn verify(&self, token: &str) -> TokenResult<SessionClaims> {
        let data = decode::<Map<String, Value>>(token, &self.decoding, &self.validation)?;
        let claims = SessionClaims::try_from(data.claims)?;

        if self.clock.now() > claims.expires_at {
            debug!(key = %self.fingerprint, "session token expired");
            return Err(TokenError::Expired);
        }

        debug!(key = %self.fingerprint, "verified session token");
        Ok(claims)
    }

    /// Verify an optional token; absence is reported as `Missing`.
    pub fn verify_session(&self, token: Option<&str>) -> SessionStatus {
        let Some(token) = token else {
            return SessionStatus::Invalid(FailureReason::Missing);
        };
        match self.verify(token) {
            Ok(claims) => SessionStatus::Valid(claims),
            Err(err) => SessionStatus::Invalid(err.reason()),
        }
    }
}

/// Expiry of a token issued at `issued_at` with a lifetime of `ttl_seconds`.
///
/// Fails when the instant falls outside the range a verifier can decode.
pub fn expiry_after(issued_at: DateTime<Utc>, ttl_seconds: i64) -> TokenResult<DateTime<Utc>> {
    let out_of_range =
        || TokenError::Signing(format!("token lifetime of {ttl_seconds}s is out of range"));
    if ttl_seconds.unsigned_abs() > MAX_TTL_SECONDS {
        return Err(out_of_range());
    }
    issued_at
        .checked_add_signed(Duration::seconds(ttl_seconds))
        .ok_or_else(out_of_range)
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("algorithm", &"HS256")
            .field("key", &self.fingerprint)
            .finish()
    }
}

fn pinned_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256];
    // Expiry is checked against the injected clock after the signature.
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation
}
