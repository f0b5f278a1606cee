use std::sync::Arc;

use common_auth::{Clock, SessionTokens};
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::credentials::CredentialVerifier;
use crate::error::AuthError;
use crate::metrics::AuthMetrics;
use crate::rate_limit::{RateLimitStore, RateLimiter};

/// Resolved configuration plus the components a login needs.
#[derive(Debug)]
pub struct Authenticator {
    pub(crate) config: Arc<ResolvedConfig>,
    pub(crate) verifier: CredentialVerifier,
    pub(crate) limiter: RateLimiter,
    pub(crate) tokens: SessionTokens,
    pub(crate) metrics: Option<AuthMetrics>,
}

impl Authenticator {
    pub fn new(
        config: ResolvedConfig,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = SessionTokens::with_clock(&config.secret_key, clock);
        let limiter = RateLimiter::new(store, config.rate_limit);
        let verifier = CredentialVerifier::new(config.bcrypt_decoy_cost);
        Self {
            config: Arc::new(config),
            verifier,
            limiter,
            tokens,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &Arc<ResolvedConfig> {
        &self.config
    }

    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    /// Rate-check, verify, reset on success, then sign a session token.
    ///
    /// Unknown users and wrong passwords produce the same
    /// [`AuthError::InvalidCredentials`].
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        identifier: Option<&str>,
    ) -> Result<String, AuthError> {
        let result = self.attempt(username, password, identifier).await;
        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "success",
                Err(err) => err.code(),
            };
            metrics.login_attempt(outcome);
        }
        result
    }

    async fn attempt(
        &self,
        username: &str,
        password: &str,
        identifier: Option<&str>,
    ) -> Result<String, AuthError> {
        if let Some(identifier) = identifier {
            let decision = self.limiter.check(identifier).await?;
            if !decision.allowed {
                let err = AuthError::throttled(decision.window_reset_at, self.tokens.clock().now());
                warn!(
                    identifier = %identifier,
                    window_reset_at = %decision.window_reset_at,
                    "Login throttled"
                );
                return Err(err);
            }
        }

        let Some(claims) = self.verifier.verify(&self.config, username, password).await? else {
            warn!(username = %username, "Invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };

        if let Some(identifier) = identifier {
            self.limiter.reset(identifier).await;
        }

        let token = self.tokens.sign(claims, &self.config.token_ttl)?;
        info!(username = %username, "Login succeeded");
        Ok(token)
    }
}
