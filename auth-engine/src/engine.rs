use std::sync::Arc;

use common_auth::{Clock, SessionClaims, SessionStatus, SystemClock};
use http::{HeaderMap, Method};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::config::{resolve, AuthSettings, EnvSource, ProcessEnv, ResolvedConfig};
use crate::cookie::SessionCookie;
use crate::error::{AuthError, ConfigError};
use crate::guard::{self, GuardDecision};
use crate::login::Authenticator;
use crate::metrics::AuthMetrics;
use crate::rate_limit::{InMemoryRateLimitStore, RateLimitStore};

/// Entry point for host applications. Configuration is resolved on first use
/// and cached for the lifetime of the engine.
pub struct AuthEngine {
    settings: AuthSettings,
    env: Arc<dyn EnvSource>,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    metrics: Option<AuthMetrics>,
    inner: OnceCell<Authenticator>,
}

pub struct AuthEngineBuilder {
    settings: AuthSettings,
    env: Option<Arc<dyn EnvSource>>,
    store: Option<Arc<dyn RateLimitStore>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<AuthMetrics>,
}

impl AuthEngineBuilder {
    pub fn env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> AuthEngine {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryRateLimitStore::with_clock(clock.clone())));
        AuthEngine {
            settings: self.settings,
            env: self.env.unwrap_or_else(|| Arc::new(ProcessEnv)),
            store,
            clock,
            metrics: self.metrics,
            inner: OnceCell::new(),
        }
    }
}

impl AuthEngine {
    pub fn builder(settings: AuthSettings) -> AuthEngineBuilder {
        AuthEngineBuilder {
            settings,
            env: None,
            store: None,
            clock: None,
            metrics: None,
        }
    }

    /// Engine reading the process environment, with an in-memory limiter.
    pub fn new(settings: AuthSettings) -> Self {
        Self::builder(settings).build()
    }

    fn authenticator(&self) -> Result<&Authenticator, ConfigError> {
        self.inner.get_or_try_init(|| {
            let config = resolve(self.settings.clone(), self.env.as_ref()).map_err(|err| {
                error!(violations = ?err.violations, "Authentication configuration rejected");
                err
            })?;
            info!(
                key = %config.secret_key.fingerprint(),
                mode = ?config.mode,
                provider = config.has_provider(),
                "Authentication configuration resolved"
            );
            let authenticator = Authenticator::new(config, self.store.clone(), self.clock.clone());
            Ok(match &self.metrics {
                Some(metrics) => authenticator.with_metrics(metrics.clone()),
                None => authenticator,
            })
        })
    }

    pub fn config(&self) -> Result<&ResolvedConfig, ConfigError> {
        Ok(self.authenticator()?.config().as_ref())
    }

    /// Log in, rate limiting by client IP or, without one, by username.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client_ip: Option<&str>,
    ) -> Result<String, AuthError> {
        let identifier = client_ip
            .filter(|ip| !ip.trim().is_empty())
            .or(Some(username).filter(|name| !name.is_empty()));
        self.authenticator()?
            .login(username, password, identifier)
            .await
    }

    pub fn verify_session(&self, token: Option<&str>) -> Result<SessionStatus, ConfigError> {
        Ok(self.authenticator()?.verify_session(token))
    }

    pub fn session(&self, token: Option<&str>) -> Result<Option<SessionClaims>, ConfigError> {
        Ok(self.authenticator()?.session(token))
    }

    /// Check credentials without rate limiting or issuing a token.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Map<String, Value>>, AuthError> {
        let auth = self.authenticator()?;
        auth.verifier.verify(auth.config(), username, password).await
    }

    pub fn logout(&self) {
        if let Some(auth) = self.inner.get() {
            auth.logout();
        }
    }

    pub fn guard(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<GuardDecision, ConfigError> {
        Ok(guard::evaluate(self.authenticator()?, method, path, headers))
    }

    pub fn session_cookie(&self) -> Result<SessionCookie, ConfigError> {
        Ok(SessionCookie::for_config(self.authenticator()?.config()))
    }

    pub fn metrics(&self) -> Option<&AuthMetrics> {
        self.metrics.as_ref()
    }
}

impl std::fmt::Debug for AuthEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEngine")
            .field("settings", &self.settings)
            .field("resolved", &self.inner.get().is_some())
            .finish_non_exhaustive()
    }
}
