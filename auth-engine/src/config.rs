use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bcrypt::HashParts;
use chrono::Utc;
use common_auth::{expiry_after, parse_ttl};
use common_crypto::SecretKey;
use tracing::warn;

use crate::credentials::CredentialProvider;
use crate::error::ConfigError;

pub const SECRET_VAR: &str = "AUTH_SECRET";
pub const USER_VAR: &str = "AUTH_USER";
pub const PASSWORD_VAR: &str = "AUTH_PASSWORD";
pub const PASSWORD_HASH_VAR: &str = "AUTH_PASSWORD_HASH";
pub const TOKEN_TTL_VAR: &str = "AUTH_TOKEN_TTL";
pub const ENV_MODE_VAR: &str = "AUTH_ENV";
pub const SESSION_COOKIE_VAR: &str = "AUTH_SESSION_COOKIE";
pub const SESSION_COOKIE_SAME_SITE_VAR: &str = "AUTH_SESSION_COOKIE_SAMESITE";
pub const LOGIN_PATH_VAR: &str = "AUTH_LOGIN_PATH";
pub const SUCCESS_REDIRECT_VAR: &str = "AUTH_SUCCESS_REDIRECT";
pub const RATE_LIMIT_MAX_ATTEMPTS_VAR: &str = "AUTH_RATE_LIMIT_MAX_ATTEMPTS";
pub const RATE_LIMIT_WINDOW_MS_VAR: &str = "AUTH_RATE_LIMIT_WINDOW_MS";
pub const ALLOW_PLAINTEXT_VAR: &str = "AUTH_ALLOW_PLAINTEXT_IN_PRODUCTION";
pub const DECOY_COST_VAR: &str = "AUTH_BCRYPT_DECOY_COST";

const MIN_PLAINTEXT_PASSWORD_CHARS: usize = 8;
const DEFAULT_SESSION_COOKIE: &str = "session";
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_SUCCESS_REDIRECT: &str = "/";
const PRODUCTION_TOKEN_TTL: &str = "1d";
const DEVELOPMENT_TOKEN_TTL: &str = "7d";
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// Where environment-sourced settings come from.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Development,
    Production,
}

impl ExecutionMode {
    pub fn is_production(&self) -> bool {
        matches!(self, ExecutionMode::Production)
    }

    fn from_env_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => ExecutionMode::Production,
            _ => ExecutionMode::Development,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CookieSameSite {
    Lax,
    #[default]
    Strict,
    None,
}

impl CookieSameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            CookieSameSite::Lax => "Lax",
            CookieSameSite::Strict => "Strict",
            CookieSameSite::None => "None",
        }
    }
}

/// What to do when production runs with a plaintext-only identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductionPolicy {
    #[default]
    Reject,
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub max_attempts: u32,
    pub window_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_ms: 900_000,
        }
    }
}

/// Explicitly supplied settings. Anything left `None` (or blank) falls back to
/// the environment, then to built-in defaults.
#[derive(Clone, Default)]
pub struct AuthSettings {
    pub secret: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub password_hash: Option<String>,
    pub credential_provider: Option<Arc<dyn CredentialProvider>>,
    pub session_cookie_name: Option<String>,
    pub session_cookie_same_site: Option<CookieSameSite>,
    pub login_path: Option<String>,
    pub success_redirect: Option<String>,
    pub token_ttl: Option<String>,
    pub rate_limit: Option<RateLimitSettings>,
    pub mode: Option<ExecutionMode>,
    pub production_policy: Option<ProductionPolicy>,
    pub bcrypt_decoy_cost: Option<u32>,
}

impl AuthSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_provider = Some(provider);
        self
    }

    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.session_cookie_name = Some(name.into());
        self
    }

    pub fn with_session_cookie_same_site(mut self, same_site: CookieSameSite) -> Self {
        self.session_cookie_same_site = Some(same_site);
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    pub fn with_success_redirect(mut self, path: impl Into<String>) -> Self {
        self.success_redirect = Some(path.into());
        self
    }

    pub fn with_token_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.token_ttl = Some(ttl.into());
        self
    }

    pub fn with_rate_limit(mut self, max_attempts: u32, window_ms: u64) -> Self {
        self.rate_limit = Some(RateLimitSettings {
            max_attempts,
            window_ms,
        });
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_production_policy(mut self, policy: ProductionPolicy) -> Self {
        self.production_policy = Some(policy);
        self
    }

    pub fn with_bcrypt_decoy_cost(mut self, cost: u32) -> Self {
        self.bcrypt_decoy_cost = Some(cost);
        self
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &self.secret.as_ref().map(|_| "***redacted***"))
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***redacted***"))
            .field("password_hash", &self.password_hash.is_some())
            .field("credential_provider", &self.credential_provider.is_some())
            .field("token_ttl", &self.token_ttl)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Immutable, validated configuration shared by every request.
#[derive(Clone)]
pub struct ResolvedConfig {
    pub secret_key: SecretKey,
    pub identity_user: String,
    pub identity_password: String,
    pub identity_password_hash: String,
    pub credential_provider: Option<Arc<dyn CredentialProvider>>,
    pub session_cookie_name: String,
    pub session_cookie_same_site: CookieSameSite,
    pub login_path: String,
    pub success_redirect: String,
    pub token_ttl: String,
    pub token_ttl_seconds: i64,
    pub rate_limit: RateLimitSettings,
    pub mode: ExecutionMode,
    pub production_policy: ProductionPolicy,
    pub bcrypt_decoy_cost: u32,
}

impl ResolvedConfig {
    pub fn has_provider(&self) -> bool {
        self.credential_provider.is_some()
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("secret_key", &self.secret_key)
            .field("key_fingerprint", &self.secret_key.fingerprint())
            .field("identity_user", &self.identity_user)
            .field("identity_password_set", &!self.identity_password.is_empty())
            .field("identity_password_hash_set", &!self.identity_password_hash.is_empty())
            .field("credential_provider", &self.credential_provider.is_some())
            .field("session_cookie_name", &self.session_cookie_name)
            .field("session_cookie_same_site", &self.session_cookie_same_site)
            .field("login_path", &self.login_path)
            .field("success_redirect", &self.success_redirect)
            .field("token_ttl", &self.token_ttl)
            .field("rate_limit", &self.rate_limit)
            .field("mode", &self.mode)
            .field("production_policy", &self.production_policy)
            .field("bcrypt_decoy_cost", &self.bcrypt_decoy_cost)
            .finish()
    }
}

/// Merge explicit settings, the environment and defaults into a [`ResolvedConfig`].
///
/// Precedence per field is explicit > environment > default. All violations are
/// collected and returned in a single [`ConfigError`].
pub fn resolve(settings: AuthSettings, env: &dyn EnvSource) -> Result<ResolvedConfig, ConfigError> {
    let mut violations = Vec::new();
    let lookup = |explicit: Option<String>, key: &str| {
        explicit
            .and_then(|value| normalize_optional(&value))
            .or_else(|| env.var(key).and_then(|value| normalize_optional(&value)))
    };

    let mode = settings.mode.unwrap_or_else(|| {
        env.var(ENV_MODE_VAR)
            .map(|value| ExecutionMode::from_env_value(&value))
            .unwrap_or_default()
    });
    let provider = settings.credential_provider;

    let secret_key = match exact_value(settings.secret, env, SECRET_VAR).map(|(value, _)| value) {
        Some(secret) => match SecretKey::from_secret(&secret) {
            Ok(key) => Some(key),
            Err(err) => {
                violations.push(format!("{SECRET_VAR} must be at least 32 bytes long ({err})"));
                None
            }
        },
        None => {
            violations.push(format!("{SECRET_VAR} is required (at least 32 bytes)"));
            None
        }
    };

    let identity_user = lookup(settings.user, USER_VAR).unwrap_or_default();
    let (identity_password, password_source) = exact_value(settings.password, env, PASSWORD_VAR)
        .map_or((String::new(), None), |(value, source)| (value, Some(source)));
    let identity_password_hash = exact_value(settings.password_hash, env, PASSWORD_HASH_VAR)
        .map(|(value, _)| value)
        .unwrap_or_default();

    if provider.is_none() {
        if identity_user.is_empty() {
            violations.push(format!("{USER_VAR} is required"));
        }
        if identity_password_hash.is_empty() {
            match password_source {
                None => violations.push(format!(
                    "either {PASSWORD_VAR} or {PASSWORD_HASH_VAR} must be provided"
                )),
                // Only environment-sourced passwords have a minimum length.
                Some(ValueSource::Environment)
                    if identity_password.chars().count() < MIN_PLAINTEXT_PASSWORD_CHARS =>
                {
                    violations.push(format!(
                        "{PASSWORD_VAR} must be at least {MIN_PLAINTEXT_PASSWORD_CHARS} characters"
                    ))
                }
                Some(_) => {}
            }
        }
    }
    if !identity_password_hash.is_empty() && HashParts::from_str(&identity_password_hash).is_err() {
        warn!(
            variable = PASSWORD_HASH_VAR,
            "configured password hash is not a valid bcrypt hash; logins against it will fail"
        );
    }

    let token_ttl = lookup(settings.token_ttl, TOKEN_TTL_VAR).unwrap_or_else(|| {
        if mode.is_production() {
            PRODUCTION_TOKEN_TTL.to_string()
        } else {
            DEVELOPMENT_TOKEN_TTL.to_string()
        }
    });
    let token_ttl_seconds = match parse_ttl(&token_ttl) {
        Ok(seconds) if expiry_after(Utc::now(), seconds).is_ok() => seconds,
        Ok(_) => {
            violations.push(format!(
                "{TOKEN_TTL_VAR}: lifetime '{token_ttl}' puts token expiry outside the supported date range"
            ));
            0
        }
        Err(err) => {
            violations.push(format!("{TOKEN_TTL_VAR}: {err}"));
            0
        }
    };

    let session_cookie_name = lookup(settings.session_cookie_name, SESSION_COOKIE_VAR)
        .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string());
    let session_cookie_same_site = match settings.session_cookie_same_site {
        Some(same_site) => same_site,
        None => match env
            .var(SESSION_COOKIE_SAME_SITE_VAR)
            .and_then(|value| normalize_optional(&value))
        {
            Some(value) => parse_same_site(&value).unwrap_or_else(|violation| {
                violations.push(violation);
                CookieSameSite::default()
            }),
            None => CookieSameSite::default(),
        },
    };
    let login_path =
        lookup(settings.login_path, LOGIN_PATH_VAR).unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
    let success_redirect = lookup(settings.success_redirect, SUCCESS_REDIRECT_VAR)
        .unwrap_or_else(|| DEFAULT_SUCCESS_REDIRECT.to_string());

    let rate_limit = match settings.rate_limit {
        Some(explicit) => explicit,
        None => {
            let defaults = RateLimitSettings::default();
            RateLimitSettings {
                max_attempts: parse_env_number(env, RATE_LIMIT_MAX_ATTEMPTS_VAR, &mut violations)
                    .unwrap_or(defaults.max_attempts),
                window_ms: parse_env_number(env, RATE_LIMIT_WINDOW_MS_VAR, &mut violations)
                    .unwrap_or(defaults.window_ms),
            }
        }
    };
    if rate_limit.max_attempts == 0 {
        violations.push(format!("{RATE_LIMIT_MAX_ATTEMPTS_VAR} must be greater than zero"));
    }
    if rate_limit.window_ms == 0 {
        violations.push(format!("{RATE_LIMIT_WINDOW_MS_VAR} must be greater than zero"));
    }

    let production_policy = match settings.production_policy {
        Some(policy) => policy,
        None => match bool_from_env(env, ALLOW_PLAINTEXT_VAR) {
            Ok(Some(true)) => ProductionPolicy::Warn,
            Ok(_) => ProductionPolicy::Reject,
            Err(violation) => {
                violations.push(violation);
                ProductionPolicy::Reject
            }
        },
    };

    let bcrypt_decoy_cost = match settings.bcrypt_decoy_cost {
        Some(cost) => cost,
        None => parse_env_number(env, DECOY_COST_VAR, &mut violations).unwrap_or(bcrypt::DEFAULT_COST),
    };
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_decoy_cost) {
        violations.push(format!(
            "{DECOY_COST_VAR} must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"
        ));
    }

    if mode.is_production() && provider.is_none() && identity_password_hash.is_empty() {
        match production_policy {
            ProductionPolicy::Reject => violations.push(format!(
                "{PASSWORD_HASH_VAR} is required in production; plaintext passwords are only allowed in development"
            )),
            ProductionPolicy::Warn => warn!(
                "running in production with a plaintext password; set {PASSWORD_HASH_VAR} to a bcrypt hash"
            ),
        }
    }

    match secret_key {
        Some(secret_key) if violations.is_empty() => Ok(ResolvedConfig {
            secret_key,
            identity_user,
            identity_password,
            identity_password_hash,
            credential_provider: provider,
            session_cookie_name,
            session_cookie_same_site,
            login_path,
            success_redirect,
            token_ttl,
            token_ttl_seconds,
            rate_limit,
            mode,
            production_policy,
            bcrypt_decoy_cost,
        }),
        _ => Err(ConfigError { violations }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueSource {
    Explicit,
    Environment,
}

/// Secret material keeps its exact bytes; only a blank value falls through
/// to the environment.
fn exact_value(
    explicit: Option<String>,
    env: &dyn EnvSource,
    key: &str,
) -> Option<(String, ValueSource)> {
    let present = |value: &String| !value.trim().is_empty();
    match explicit.filter(present) {
        Some(value) => Some((value, ValueSource::Explicit)),
        None => env
            .var(key)
            .filter(present)
            .map(|value| (value, ValueSource::Environment)),
    }
}

fn parse_same_site(value: &str) -> Result<CookieSameSite, String> {
    match value.to_ascii_lowercase().as_str() {
        "lax" => Ok(CookieSameSite::Lax),
        "strict" => Ok(CookieSameSite::Strict),
        "none" => Ok(CookieSameSite::None),
        other => Err(format!(
            "{SESSION_COOKIE_SAME_SITE_VAR} '{other}' is not supported. Use Lax, Strict, or None."
        )),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn bool_from_env(env: &dyn EnvSource, key: &str) -> Result<Option<bool>, String> {
    let Some(value) = env.var(key).and_then(|value| normalize_optional(&value)) else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(format!("{key} must be a boolean, got '{other}'")),
    }
}

fn parse_env_number<T: FromStr>(
    env: &dyn EnvSource,
    key: &str,
    violations: &mut Vec<String>,
) -> Option<T> {
    let value = env.var(key).and_then(|value| normalize_optional(&value))?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            violations.push(format!("{key} must be a non-negative integer, got '{value}'"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    /// Collects formatted log lines written by a scoped subscriber.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl LogCapture {
        fn contents(&self) -> String {
            let buffer = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            String::from_utf8_lossy(&buffer).into_owned()
        }
    }

    impl std::io::Write for LogCapture {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            let mut buffer = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            buffer.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn explicit_settings_need_no_environment() {
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_user("admin")
            .with_password("password123");
        let config = resolve(settings, &HashMap::new()).expect("resolve");

        assert_eq!(config.identity_user, "admin");
        assert_eq!(config.session_cookie_name, "session");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.success_redirect, "/");
        assert_eq!(config.token_ttl, "7d");
        assert_eq!(config.token_ttl_seconds, 604_800);
        assert_eq!(config.rate_limit, RateLimitSettings::default());
        assert_eq!(config.bcrypt_decoy_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.secret_key.as_bytes(), SECRET.as_bytes());
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_user("explicit")
            .with_password("password123")
            .with_token_ttl("1h");
        let environment = env(&[(USER_VAR, "from-env"), (TOKEN_TTL_VAR, "30m")]);
        let config = resolve(settings, &environment).expect("resolve");

        assert_eq!(config.identity_user, "explicit");
        assert_eq!(config.token_ttl_seconds, 3_600);
    }

    #[test]
    fn environment_fills_unset_fields() {
        let environment = env(&[
            (SECRET_VAR, SECRET),
            (USER_VAR, "admin"),
            (PASSWORD_VAR, "password123"),
            (SESSION_COOKIE_VAR, "sid"),
            (RATE_LIMIT_MAX_ATTEMPTS_VAR, "3"),
            (RATE_LIMIT_WINDOW_MS_VAR, "60000"),
        ]);
        let config = resolve(AuthSettings::new(), &environment).expect("resolve");

        assert_eq!(config.identity_password, "password123");
        assert_eq!(config.session_cookie_name, "sid");
        assert_eq!(
            config.rate_limit,
            RateLimitSettings {
                max_attempts: 3,
                window_ms: 60_000
            }
        );
    }

    #[test]
    fn collects_every_violation() {
        let environment = env(&[(SECRET_VAR, "short"), (RATE_LIMIT_WINDOW_MS_VAR, "soon")]);
        let err = resolve(AuthSettings::new(), &environment).expect_err("invalid");

        assert_eq!(err.violations.len(), 4, "{:?}", err.violations);
        assert!(err.violations[0].contains(SECRET_VAR));
        assert!(err.violations.iter().any(|v| v.contains(USER_VAR)));
        assert!(err.violations.iter().any(|v| v.contains(PASSWORD_HASH_VAR)));
        assert!(err.violations.iter().any(|v| v.contains(RATE_LIMIT_WINDOW_MS_VAR)));
    }

    #[test]
    fn short_environment_password_is_rejected() {
        let environment = env(&[
            (SECRET_VAR, SECRET),
            (USER_VAR, "admin"),
            (PASSWORD_VAR, "short"),
        ]);
        let err = resolve(AuthSettings::new(), &environment).expect_err("too short");
        assert_eq!(err.violations.len(), 1);
        assert!(err.violations[0].contains("at least 8 characters"));
    }

    #[test]
    fn short_explicit_password_is_accepted() {
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_user("admin")
            .with_password("admin");
        let config = resolve(settings, &HashMap::new()).expect("explicit values are trusted");
        assert_eq!(config.identity_password, "admin");
    }

    #[test]
    fn missing_password_and_hash_is_rejected_on_both_paths() {
        let explicit = AuthSettings::new().with_secret(SECRET).with_user("admin");
        let err = resolve(explicit, &HashMap::new()).expect_err("no password");
        assert_eq!(err.violations.len(), 1);
        assert!(err.violations[0].contains(PASSWORD_HASH_VAR));

        let environment = env(&[(SECRET_VAR, SECRET), (USER_VAR, "admin"), (PASSWORD_VAR, "  ")]);
        let err = resolve(AuthSettings::new(), &environment).expect_err("blank password");
        assert_eq!(err.violations.len(), 1);
        assert!(err.violations[0].contains(PASSWORD_HASH_VAR));
    }

    #[test]
    fn secret_and_password_keep_surrounding_whitespace() {
        let padded_secret = format!(" {SECRET} ");
        let settings = AuthSettings::new()
            .with_secret(padded_secret.clone())
            .with_user(" admin ")
            .with_password("  hunter2hunter2  ");
        let config = resolve(settings, &HashMap::new()).expect("resolve");

        assert_eq!(config.secret_key.as_bytes(), padded_secret.as_bytes());
        assert_eq!(config.secret_key.len(), 34);
        assert_eq!(config.identity_password, "  hunter2hunter2  ");
        assert_eq!(config.identity_user, "admin");

        let environment = env(&[
            (SECRET_VAR, SECRET),
            (USER_VAR, "admin"),
            (PASSWORD_HASH_VAR, "$2b$04$hash "),
        ]);
        let config = resolve(AuthSettings::new(), &environment).expect("resolve");
        assert_eq!(config.identity_password_hash, "$2b$04$hash ");
    }

    #[test]
    fn provider_only_requires_secret() {
        let provider: Arc<dyn CredentialProvider> =
            Arc::new(crate::credentials::StaticCredentialProvider::default());
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_credential_provider(provider)
            .with_mode(ExecutionMode::Production);
        let config = resolve(settings, &HashMap::new()).expect("resolve");

        assert!(config.has_provider());
        assert_eq!(config.token_ttl, "1d");
    }

    #[test]
    fn production_without_hash_is_rejected_by_default() {
        let environment = env(&[
            (SECRET_VAR, SECRET),
            (USER_VAR, "admin"),
            (PASSWORD_VAR, "password123"),
            (ENV_MODE_VAR, "production"),
        ]);
        let err = resolve(AuthSettings::new(), &environment).expect_err("rejected");
        assert_eq!(err.violations.len(), 1);
        assert!(err.violations[0].contains("required in production"));
    }

    #[test]
    fn production_without_hash_can_downgrade_to_warning() {
        let environment = env(&[
            (SECRET_VAR, SECRET),
            (USER_VAR, "admin"),
            (PASSWORD_VAR, "password123"),
            (ENV_MODE_VAR, "prod"),
            (ALLOW_PLAINTEXT_VAR, "yes"),
        ]);
        let logs = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let config = tracing::subscriber::with_default(subscriber, || {
            resolve(AuthSettings::new(), &environment)
        })
        .expect("warn only");

        assert_eq!(config.mode, ExecutionMode::Production);
        assert_eq!(config.production_policy, ProductionPolicy::Warn);
        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("running in production with a plaintext password"), "{output}");
    }

    #[test]
    fn hashed_production_identity_logs_no_plaintext_warning() {
        let environment = env(&[
            (SECRET_VAR, SECRET),
            (USER_VAR, "admin"),
            (PASSWORD_HASH_VAR, "$2b$04$KvJ1p3mF6JvVf1aZLQ3xUuO1yQ6c4V0p2V3JdT1yYb6nq8oQm0a4K"),
            (ENV_MODE_VAR, "production"),
            (ALLOW_PLAINTEXT_VAR, "yes"),
        ]);
        let logs = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || resolve(AuthSettings::new(), &environment))
            .expect("resolve");
        assert!(!logs.contents().contains("plaintext password"));
    }

    #[test]
    fn unparsable_boolean_is_a_violation() {
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_user("admin")
            .with_password("password123");
        let environment = env(&[(ALLOW_PLAINTEXT_VAR, "maybe")]);
        let err = resolve(settings, &environment).expect_err("bad bool");
        assert!(err.violations[0].contains(ALLOW_PLAINTEXT_VAR));
    }

    #[test]
    fn invalid_ttl_is_a_violation() {
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_user("admin")
            .with_password("password123")
            .with_token_ttl("soon");
        let err = resolve(settings, &HashMap::new()).expect_err("bad ttl");
        assert!(err.violations[0].contains(TOKEN_TTL_VAR));
    }

    #[test]
    fn unrepresentable_ttl_is_a_violation() {
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_user("admin")
            .with_password("password123")
            .with_token_ttl("300000y");
        let err = resolve(settings, &HashMap::new()).expect_err("beyond the calendar");
        assert_eq!(err.violations.len(), 1);
        assert!(err.violations[0].contains(TOKEN_TTL_VAR));
        assert!(err.violations[0].contains("date range"));
    }

    #[test]
    fn same_site_defaults_to_strict_and_reads_environment() {
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_user("admin")
            .with_password("password123");
        let config = resolve(settings.clone(), &HashMap::new()).expect("resolve");
        assert_eq!(config.session_cookie_same_site, CookieSameSite::Strict);

        let environment = env(&[(SESSION_COOKIE_SAME_SITE_VAR, " Lax ")]);
        let config = resolve(settings.clone(), &environment).expect("resolve");
        assert_eq!(config.session_cookie_same_site, CookieSameSite::Lax);

        let environment = env(&[(SESSION_COOKIE_SAME_SITE_VAR, "sideways")]);
        let err = resolve(settings, &environment).expect_err("unsupported");
        assert!(err.violations[0].contains(SESSION_COOKIE_SAME_SITE_VAR));
    }

    #[test]
    fn blank_explicit_values_fall_through() {
        let settings = AuthSettings::new()
            .with_secret("   ")
            .with_user("admin")
            .with_password("password123");
        let environment = env(&[(SECRET_VAR, SECRET)]);
        let config = resolve(settings, &environment).expect("resolve");
        assert_eq!(config.secret_key.len(), 32);
    }

    #[test]
    fn debug_output_is_redacted() {
        let settings = AuthSettings::new()
            .with_secret(SECRET)
            .with_user("admin")
            .with_password("password123");
        let config = resolve(settings.clone(), &HashMap::new()).expect("resolve");

        for rendered in [format!("{config:?}"), format!("{settings:?}")] {
            assert!(!rendered.contains(SECRET));
            assert!(!rendered.contains("password123"));
        }
    }
}
