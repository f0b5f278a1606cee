use common_auth::{SessionClaims, SessionStatus};
use tracing::debug;

use crate::login::Authenticator;

impl Authenticator {
    /// Check a session token taken from the client. Absence is `Missing`.
    pub fn verify_session(&self, token: Option<&str>) -> SessionStatus {
        let status = self.tokens.verify_session(token);
        let result = match status.reason() {
            None => "valid",
            Some(reason) => {
                debug!(reason = %reason, "session rejected");
                reason.as_str()
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.session_check(result);
        }
        status
    }

    /// Claims of a valid session, `None` for any failure.
    pub fn session(&self, token: Option<&str>) -> Option<SessionClaims> {
        self.verify_session(token).into_claims()
    }

    /// Tokens are stateless; the caller discards the client copy.
    pub fn logout(&self) {
        debug!("logout requested; nothing to revoke");
    }
}
