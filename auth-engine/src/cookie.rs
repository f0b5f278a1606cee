use http::header::{InvalidHeaderValue, COOKIE};
use http::{HeaderMap, HeaderValue};

use crate::config::{CookieSameSite, ResolvedConfig};

/// Attributes of the cookie that carries the session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub path: String,
    pub secure: bool,
    pub same_site: CookieSameSite,
}

impl SessionCookie {
    /// HttpOnly, path `/`, `Secure` only in production. `SameSite` comes from
    /// the configuration and defaults to `Strict`.
    pub fn for_config(config: &ResolvedConfig) -> Self {
        Self {
            name: config.session_cookie_name.clone(),
            path: "/".to_string(),
            secure: config.mode.is_production(),
            same_site: config.session_cookie_same_site,
        }
    }

    /// `Set-Cookie` value storing `token`.
    pub fn set_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.render(token, None))
    }

    /// `Set-Cookie` value that removes the session from the client.
    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.render("", Some(0)))
    }

    /// Session token from the request's `Cookie` headers, if present.
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == self.name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn render(&self, value: &str, max_age: Option<i64>) -> String {
        let mut cookie = format!(
            "{}={value}; Path={}; HttpOnly; SameSite={}",
            self.name,
            self.path,
            self.same_site.as_str()
        );
        if let Some(max_age) = max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, AuthSettings, ExecutionMode};
    use std::collections::HashMap;

    fn settings(mode: ExecutionMode) -> AuthSettings {
        let hash = "$2b$04$KvJ1p3mF6JvVf1aZLQ3xUuO1yQ6c4V0p2V3JdT1yYb6nq8oQm0a4K";
        AuthSettings::new()
            .with_secret("0123456789abcdef0123456789abcdef")
            .with_user("admin")
            .with_password_hash(hash)
            .with_session_cookie_name("sid")
            .with_mode(mode)
    }

    fn cookie(mode: ExecutionMode) -> SessionCookie {
        SessionCookie::for_config(&resolve(settings(mode), &HashMap::new()).expect("resolve"))
    }

    #[test]
    fn development_cookie_is_not_secure() {
        let header = cookie(ExecutionMode::Development)
            .set_cookie("abc.def.ghi")
            .expect("header");
        assert_eq!(
            header.to_str().unwrap(),
            "sid=abc.def.ghi; Path=/; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn production_cookie_is_secure() {
        let session = cookie(ExecutionMode::Production);
        let header = session.set_cookie("abc.def.ghi").expect("header");
        assert!(header.to_str().unwrap().ends_with("; Secure"));

        let cleared = session.clear_cookie().expect("header");
        assert_eq!(
            cleared.to_str().unwrap(),
            "sid=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0; Secure"
        );
    }

    #[test]
    fn same_site_follows_configuration() {
        let explicit = settings(ExecutionMode::Development)
            .with_session_cookie_same_site(CookieSameSite::Lax);
        let session =
            SessionCookie::for_config(&resolve(explicit, &HashMap::new()).expect("resolve"));
        assert_eq!(
            session.set_cookie("abc").expect("header").to_str().unwrap(),
            "sid=abc; Path=/; HttpOnly; SameSite=Lax"
        );

        let environment = HashMap::from([(
            "AUTH_SESSION_COOKIE_SAMESITE".to_string(),
            "none".to_string(),
        )]);
        let config = resolve(settings(ExecutionMode::Production), &environment).expect("resolve");
        let header = SessionCookie::for_config(&config)
            .set_cookie("abc")
            .expect("header");
        assert_eq!(
            header.to_str().unwrap(),
            "sid=abc; Path=/; HttpOnly; SameSite=None; Secure"
        );
    }

    #[test]
    fn extracts_named_cookie() {
        let session = cookie(ExecutionMode::Development);
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; sid=tok.en.value"));
        assert_eq!(session.extract(&headers).as_deref(), Some("tok.en.value"));

        headers.insert(COOKIE, HeaderValue::from_static("sid=; theme=dark"));
        assert_eq!(session.extract(&headers), None);

        assert_eq!(session.extract(&HeaderMap::new()), None);
    }

    #[test]
    fn rejects_values_that_break_the_header() {
        let session = cookie(ExecutionMode::Development);
        assert!(session.set_cookie("line\nbreak").is_err());
    }
}
