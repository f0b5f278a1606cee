//! Framework-agnostic access decision for an incoming request.

use http::header::{HOST, ORIGIN};
use http::{HeaderMap, Method, StatusCode};
use tracing::warn;
use url::Url;

use crate::cookie::SessionCookie;
use crate::login::Authenticator;

const AUTH_API_PREFIX: &str = "/api/auth/";
const API_PREFIX: &str = "/api/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Cross-origin state-changing request.
    Forbidden,
    /// API request without a valid session.
    Unauthorized,
    /// Page request without a valid session; send the browser to `location`.
    Redirect { location: String },
}

impl GuardDecision {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardDecision::Allow => StatusCode::OK,
            GuardDecision::Forbidden => StatusCode::FORBIDDEN,
            GuardDecision::Unauthorized => StatusCode::UNAUTHORIZED,
            GuardDecision::Redirect { .. } => StatusCode::TEMPORARY_REDIRECT,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Decide whether a request may proceed.
///
/// Order: origin check for state-changing methods, public paths, then the
/// session cookie.
pub fn evaluate(auth: &Authenticator, method: &Method, path: &str, headers: &HeaderMap) -> GuardDecision {
    if is_state_changing(method) && !origin_matches_host(headers) {
        return GuardDecision::Forbidden;
    }

    let config = auth.config();
    if path == config.login_path || path.starts_with(AUTH_API_PREFIX) {
        return GuardDecision::Allow;
    }

    let token = SessionCookie::for_config(config).extract(headers);
    let status = auth.verify_session(token.as_deref());
    if status.is_valid() {
        return GuardDecision::Allow;
    }
    if token.is_some() {
        if let Some(reason) = status.reason() {
            warn!(reason = %reason, path = %path, "Session rejected");
        }
    }

    if path.starts_with(API_PREFIX) {
        GuardDecision::Unauthorized
    } else {
        GuardDecision::Redirect {
            location: config.login_path.clone(),
        }
    }
}

fn is_state_changing(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::DELETE, Method::PATCH].contains(method)
}

/// A request without `Origin` passes; otherwise its host (with a non-default
/// port) must equal the `Host` header.
fn origin_matches_host(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(ORIGIN) else {
        return true;
    };
    let host = headers.get(HOST).and_then(|value| value.to_str().ok());

    let origin_host = origin
        .to_str()
        .ok()
        .and_then(|value| Url::parse(value).ok())
        .and_then(|url| {
            let name = url.host_str()?.to_string();
            Some(match url.port() {
                Some(port) => format!("{name}:{port}"),
                None => name,
            })
        });

    match (origin_host, host) {
        (Some(origin_host), Some(host)) if origin_host.eq_ignore_ascii_case(host) => true,
        (Some(origin_host), host) => {
            warn!(origin = %origin_host, host = ?host, "CSRF blocked: origin does not match host");
            false
        }
        (None, _) => {
            warn!("CSRF blocked: unparsable origin");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, AuthSettings};
    use crate::rate_limit::InMemoryRateLimitStore;
    use common_auth::SystemClock;
    use http::header::COOKIE;
    use http::HeaderValue;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn authenticator() -> Authenticator {
        let settings = AuthSettings::new()
            .with_secret("0123456789abcdef0123456789abcdef")
            .with_user("admin")
            .with_password("password123");
        let config = resolve(settings, &HashMap::new()).expect("resolve");
        Authenticator::new(
            config,
            Arc::new(InMemoryRateLimitStore::new()),
            Arc::new(SystemClock),
        )
    }

    fn headers(pairs: &[(http::header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn cross_origin_post_is_forbidden() {
        let auth = authenticator();
        let request = headers(&[(ORIGIN, "https://evil.example"), (HOST, "app.example")]);
        let decision = evaluate(&auth, &Method::POST, "/login", &request);
        assert_eq!(decision, GuardDecision::Forbidden);
        assert_eq!(decision.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn same_origin_post_with_port_passes_origin_check() {
        let auth = authenticator();
        let request = headers(&[(ORIGIN, "http://localhost:3000"), (HOST, "localhost:3000")]);
        assert!(evaluate(&auth, &Method::POST, "/login", &request).is_allowed());
    }

    #[test]
    fn unparsable_origin_is_forbidden() {
        let auth = authenticator();
        let request = headers(&[(ORIGIN, "null"), (HOST, "app.example")]);
        assert_eq!(
            evaluate(&auth, &Method::DELETE, "/api/items", &request),
            GuardDecision::Forbidden
        );
    }

    #[test]
    fn get_ignores_origin() {
        let auth = authenticator();
        let request = headers(&[(ORIGIN, "https://evil.example"), (HOST, "app.example")]);
        assert!(evaluate(&auth, &Method::GET, "/api/auth/login", &request).is_allowed());
    }

    #[test]
    fn missing_session_depends_on_path() {
        let auth = authenticator();
        let empty = HeaderMap::new();
        assert_eq!(
            evaluate(&auth, &Method::GET, "/api/items", &empty),
            GuardDecision::Unauthorized
        );
        assert_eq!(
            evaluate(&auth, &Method::GET, "/dashboard", &empty),
            GuardDecision::Redirect {
                location: "/login".to_string()
            }
        );
    }

    #[tokio::test]
    async fn valid_session_cookie_is_allowed() {
        let auth = authenticator();
        let token = auth.login("admin", "password123", None).await.expect("login");
        let mut request = HeaderMap::new();
        request.insert(
            COOKIE,
            HeaderValue::from_str(&format!("session={token}")).expect("cookie"),
        );
        assert!(evaluate(&auth, &Method::GET, "/dashboard", &request).is_allowed());

        request.insert(COOKIE, HeaderValue::from_static("session=forged.token.value"));
        assert_eq!(
            evaluate(&auth, &Method::GET, "/api/items", &request),
            GuardDecision::Unauthorized
        );
    }
}
