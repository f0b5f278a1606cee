pub mod config;
pub mod cookie;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod guard;
pub mod login;
pub mod metrics;
pub mod rate_limit;
mod session;

pub use config::{
    resolve, AuthSettings, CookieSameSite, EnvSource, ExecutionMode, ProcessEnv,
    ProductionPolicy, RateLimitSettings, ResolvedConfig,
};
pub use cookie::SessionCookie;
pub use credentials::{
    verify_password, CredentialProvider, CredentialVerifier, StaticCredentialProvider, UserRecord,
};
pub use engine::{AuthEngine, AuthEngineBuilder};
pub use error::{AuthError, ConfigError};
pub use guard::GuardDecision;
pub use login::Authenticator;
pub use metrics::AuthMetrics;
pub use rate_limit::{
    InMemoryRateLimitStore, RateDecision, RateLimitRecord, RateLimitStore, RateLimiter,
};
