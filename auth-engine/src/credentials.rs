use std::collections::HashMap;

use async_trait::async_trait;
use common_crypto::safe_compare;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::config::ResolvedConfig;
use crate::error::AuthError;

const USER_CLAIM: &str = "user";
const PASSWORD_HASH_FIELD: &str = "password_hash";
const DECOY_PASSWORD: &str = "decoy-password-for-absent-users";

/// A user as returned by an external credential provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    /// Additional claims copied into the session token.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password_hash: password_hash.into(),
            extra: Map::new(),
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Token claims for this user; the password hash never leaves the record.
    pub fn into_claims(self) -> Map<String, Value> {
        let mut claims = self.extra;
        claims.remove(PASSWORD_HASH_FIELD);
        claims.insert("id".to_string(), Value::String(self.id));
        claims.insert("username".to_string(), Value::String(self.username));
        claims
    }
}

/// Multi-user lookup supplied by the host application.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn find_user(&self, username: &str) -> anyhow::Result<Option<UserRecord>>;
}

/// Provider backed by a fixed set of records.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    users: HashMap<String, UserRecord>,
}

impl StaticCredentialProvider {
    pub fn new(records: impl IntoIterator<Item = UserRecord>) -> Self {
        Self {
            users: records
                .into_iter()
                .map(|record| (record.username.clone(), record))
                .collect(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn find_user(&self, username: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.users.get(username).cloned())
    }
}

/// Compare a submitted password against a bcrypt hash, else a plaintext secret.
///
/// A malformed hash is a mismatch, never an error.
pub fn verify_password(password: &str, hash: &str, plaintext: &str) -> bool {
    if !hash.is_empty() {
        return bcrypt::verify(password, hash).unwrap_or(false);
    }
    if !plaintext.is_empty() {
        return safe_compare(password, plaintext);
    }
    false
}

/// Checks submitted credentials against the built-in identity or a provider.
#[derive(Debug)]
pub struct CredentialVerifier {
    decoy_hash: Option<String>,
}

impl CredentialVerifier {
    /// Hashes the decoy up front so the first absent-user lookup costs the
    /// same as every later one.
    pub fn new(decoy_cost: u32) -> Self {
        let decoy_hash = match bcrypt::hash(DECOY_PASSWORD, decoy_cost) {
            Ok(hash) => Some(hash),
            Err(err) => {
                warn!(error = %err, cost = decoy_cost, "failed to prepare decoy hash");
                None
            }
        };
        Self { decoy_hash }
    }

    /// Single-identity check. The password comparison runs even when the
    /// username does not match.
    pub fn check_credentials(&self, config: &ResolvedConfig, username: &str, password: &str) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }
        let user_matches = username == config.identity_user;
        let password_matches = verify_password(
            password,
            &config.identity_password_hash,
            &config.identity_password,
        );
        user_matches && password_matches
    }

    /// Verify credentials and return the claims to embed in the session token.
    ///
    /// `Ok(None)` means the credentials were rejected. Provider failures are
    /// reported as [`AuthError::Unavailable`].
    pub async fn verify(
        &self,
        config: &ResolvedConfig,
        username: &str,
        password: &str,
    ) -> Result<Option<Map<String, Value>>, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let Some(provider) = config.credential_provider.as_ref() else {
            if !self.check_credentials(config, username, password) {
                return Ok(None);
            }
            let mut claims = Map::new();
            claims.insert(USER_CLAIM.to_string(), Value::String(username.to_string()));
            return Ok(Some(claims));
        };

        let record = provider.find_user(username).await.map_err(|err| {
            error!(error = %err, "credential provider lookup failed");
            AuthError::Unavailable(err.to_string())
        })?;

        match record {
            Some(record) => {
                if bcrypt::verify(password, &record.password_hash).unwrap_or(false) {
                    Ok(Some(record.into_claims()))
                } else {
                    Ok(None)
                }
            }
            None => {
                self.burn_decoy(password);
                Ok(None)
            }
        }
    }

    /// Spend the same bcrypt work on an absent user as on a present one.
    fn burn_decoy(&self, password: &str) {
        if let Some(hash) = &self.decoy_hash {
            let _ = bcrypt::verify(password, hash);
        }
        debug!("credential lookup found no user");
    }
}
