use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{TokenError, TokenResult};

/// Wire name of the issued-at timestamp (seconds since epoch).
pub const ISSUED_AT_CLAIM: &str = "iat";
/// Wire name of the expiry timestamp (seconds since epoch).
pub const EXPIRES_AT_CLAIM: &str = "exp";

const USER_CLAIM: &str = "user";

/// Verified session payload: caller claims plus the two lifetime timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionClaims {
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    /// Every claim except `iat` and `exp`.
    pub custom: Map<String, Value>,
}

impl SessionClaims {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.custom.get(key)
    }

    /// The `user` claim written for the built-in single identity.
    pub fn user(&self) -> Option<&str> {
        self.custom.get(USER_CLAIM).and_then(Value::as_str)
    }

    /// Rebuild the full payload as carried on the wire.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = self.custom.clone();
        if let Some(issued_at) = self.issued_at {
            payload.insert(ISSUED_AT_CLAIM.to_string(), Value::from(issued_at.timestamp()));
        }
        payload.insert(
            EXPIRES_AT_CLAIM.to_string(),
            Value::from(self.expires_at.timestamp()),
        );
        payload
    }
}

impl TryFrom<Map<String, Value>> for SessionClaims {
    type Error = TokenError;

    fn try_from(mut value: Map<String, Value>) -> TokenResult<Self> {
        let expires_at = match value.remove(EXPIRES_AT_CLAIM) {
            Some(raw) => timestamp(EXPIRES_AT_CLAIM, &raw)?,
            None => return Err(TokenError::Invalid("missing 'exp' claim".to_string())),
        };
        let issued_at = match value.remove(ISSUED_AT_CLAIM) {
            Some(raw) => Some(timestamp(ISSUED_AT_CLAIM, &raw)?),
            None => None,
        };

        Ok(Self {
            issued_at,
            expires_at,
            custom: value,
        })
    }
}

fn timestamp(claim: &'static str, raw: &Value) -> TokenResult<DateTime<Utc>> {
    let seconds = raw
        .as_i64()
        .or_else(|| raw.as_f64().map(|value| value.floor() as i64))
        .ok_or_else(|| TokenError::Invalid(format!("invalid claim '{claim}' with value '{raw}'")))?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| TokenError::Invalid(format!("invalid claim '{claim}' with value '{raw}'")))
}
