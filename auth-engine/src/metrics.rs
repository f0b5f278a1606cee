use anyhow::Result;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    session_checks: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let session_checks = IntCounterVec::new(
            Opts::new(
                "auth_session_checks_total",
                "Count of session token checks grouped by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(session_checks.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            session_checks,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn session_check(&self, result: &str) {
        self.session_checks.with_label_values(&[result]).inc();
    }

    pub fn login_attempts(&self, outcome: &str) -> u64 {
        self.login_attempts.with_label_values(&[outcome]).get()
    }

    pub fn session_checks(&self, result: &str) -> u64 {
        self.session_checks.with_label_values(&[result]).get()
    }

    /// Prometheus text exposition (`text/plain; version=0.0.4`).
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for AuthMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMetrics").finish_non_exhaustive()
    }
}
