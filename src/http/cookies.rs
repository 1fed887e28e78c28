//! Session cookie attributes and application of engine cookie effects.

use std::time::Duration;

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::OffsetDateTime;

use crate::auth::CookieEffect;
use crate::config::CookieConfig;

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub expire: Duration,
}

impl CookieSettings {
    pub fn from_config(config: &CookieConfig) -> Self {
        Self {
            name: config.name.clone(),
            domain: config.domain.clone().filter(|d| !d.is_empty()),
            secure: config.secure,
            http_only: config.http_only,
            expire: Duration::from_secs(config.expire_secs),
        }
    }

    /// Session cookie value sent by the client, if any.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        CookieJar::from_headers(headers)
            .get(&self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn session_cookie(&self, value: String, host: Option<&str>, now: OffsetDateTime) -> Cookie<'static> {
        self.build(value, host, now + self.expire)
    }

    pub fn cleared_cookie(&self, host: Option<&str>, now: OffsetDateTime) -> Cookie<'static> {
        self.build(String::new(), host, now - Duration::from_secs(3600))
    }

    /// Append `Set-Cookie` headers for each effect.
    pub fn apply(
        &self,
        effects: &[CookieEffect],
        host: Option<&str>,
        now: OffsetDateTime,
        headers: &mut HeaderMap,
    ) {
        for effect in effects {
            let cookie = match effect {
                CookieEffect::Set(value) => self.session_cookie(value.clone(), host, now),
                CookieEffect::Clear => self.cleared_cookie(host, now),
            };
            append(headers, &cookie);
        }
    }

    fn build(&self, value: String, host: Option<&str>, expires: OffsetDateTime) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), value))
            .path("/")
            .http_only(self.http_only)
            .secure(self.secure)
            .expires(expires);
        if let Some(domain) = self.domain_for(host) {
            builder = builder.domain(domain);
        }
        builder.build()
    }

    fn domain_for(&self, host: Option<&str>) -> Option<String> {
        let request_host = host.map(strip_port).filter(|h| !h.is_empty());
        match (&self.domain, request_host) {
            (Some(domain), Some(host)) => {
                if !host.ends_with(domain.as_str()) {
                    tracing::warn!(
                        host = %host,
                        domain = %domain,
                        "Request host does not match the configured cookie domain"
                    );
                }
                Some(domain.clone())
            }
            (Some(domain), None) => Some(domain.clone()),
            (None, host) => host.map(str::to_string),
        }
    }
}

/// Append one `Set-Cookie` header.
pub fn append(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        headers.append(SET_COOKIE, value);
    }
}

/// `example.com:8080` → `example.com`, `[::1]:80` → `::1`.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn settings(domain: Option<&str>) -> CookieSettings {
        CookieSettings {
            name: "_lap".to_string(),
            domain: domain.map(str::to_string),
            secure: true,
            http_only: true,
            expire: Duration::from_secs(3600),
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = settings(None).session_cookie("token".into(), Some("app.example.com:8080"), now());
        assert_eq!(cookie.name(), "_lap");
        assert_eq!(cookie.value(), "token");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("app.example.com"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.expires_datetime(), Some(now() + Duration::from_secs(3600)));
    }

    #[test]
    fn configured_domain_wins() {
        let cookie = settings(Some("example.com")).session_cookie("t".into(), Some("other.org"), now());
        assert_eq!(cookie.domain(), Some("example.com"));
    }

    #[test]
    fn cleared_cookie_is_in_the_past() {
        let cookie = settings(None).cleared_cookie(None, now());
        assert_eq!(cookie.value(), "");
        assert!(cookie.expires_datetime().unwrap() < now());
        assert_eq!(cookie.domain(), None);
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("other=1; _lap=abc"));
        assert_eq!(settings(None).read(&headers).as_deref(), Some("abc"));
        assert_eq!(settings(None).read(&HeaderMap::new()), None);
    }

    #[test]
    fn apply_appends_one_header_per_effect() {
        let mut headers = HeaderMap::new();
        settings(None).apply(
            &[CookieEffect::Set("v".into()), CookieEffect::Clear],
            None,
            now(),
            &mut headers,
        );
        assert_eq!(headers.get_all(SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn strips_ports() {
        assert_eq!(strip_port("example.com:80"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "::1");
    }
}
