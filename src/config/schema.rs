//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the authenticating proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Session cookie settings.
    pub cookie: CookieConfig,

    /// Upstreams, path prefix and identity forwarding.
    pub proxy: UpstreamConfig,

    /// Requests that bypass authentication.
    pub skip_auth: SkipAuthConfig,

    /// Local credential file.
    pub htpasswd: HtpasswdConfig,

    /// Directory server.
    pub ldap: LdapConfig,

    /// Email allow-list.
    pub validator: ValidatorConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4180").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:4180".to_string(),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,

    /// Signing secret; also the AES key when refresh is enabled.
    pub secret: String,

    /// Cookie domain; empty means the request host.
    pub domain: Option<String>,

    pub secure: bool,

    pub http_only: bool,

    /// Session lifetime in seconds.
    pub expire_secs: u64,

    /// Re-issue cookies older than this (0 disables refresh and encryption).
    pub refresh_secs: u64,

    /// MAC hash: sha1, sha256 or sha512.
    pub hash: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "_ldap_proxy".to_string(),
            secret: String::new(),
            domain: None,
            secure: true,
            http_only: true,
            expire_secs: 168 * 3600,
            refresh_secs: 0,
            hash: "sha256".to_string(),
        }
    }
}

/// Upstream and identity forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Prefix for the proxy's own endpoints (sign_in, sign_out, auth).
    pub prefix: String,

    /// Ordered upstream URLs (`http`, `https` or `file`).
    pub upstreams: Vec<String>,

    /// Keep the inbound Host header when proxying.
    pub pass_host_header: bool,

    pub pass_basic_auth: bool,

    /// Password sent upstream with `pass_basic_auth`.
    pub basic_auth_password: String,

    pub pass_user_headers: bool,

    /// Add X-Auth-Request-User/Email to responses.
    pub set_xauthrequest: bool,

    /// `<algo>:<secret>` used to sign proxied requests.
    pub signature_key: Option<String>,

    /// Largest request body forwarded upstream.
    pub max_body_bytes: usize,

    /// Text shown above the sign-in form.
    pub sign_in_message: String,

    /// Page footer; "-" hides it.
    pub footer: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            prefix: "/ldap_proxy".to_string(),
            upstreams: Vec::new(),
            pass_host_header: true,
            pass_basic_auth: true,
            basic_auth_password: String::new(),
            pass_user_headers: true,
            set_xauthrequest: false,
            signature_key: None,
            max_body_bytes: 10 * 1024 * 1024,
            sign_in_message: String::new(),
            footer: String::new(),
        }
    }
}

/// Authentication bypass rules.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SkipAuthConfig {
    /// Path regexes that skip authentication.
    pub regex: Vec<String>,

    /// Client IPs or CIDR ranges that skip authentication.
    pub ips: Vec<String>,

    /// Let CORS preflight (OPTIONS) requests through.
    pub preflight: bool,

    /// Header holding the real client IP (e.g. "X-Real-IP").
    pub real_ip_header: Option<String>,

    /// Header holding a proxy chain (e.g. "X-Forwarded-For").
    pub proxy_ip_header: Option<String>,
}

/// Local credential file configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HtpasswdConfig {
    /// Path to an htpasswd file; also enables Basic-Auth.
    pub file: Option<String>,
}

/// Directory server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LdapConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Connect with `ldaps://`.
    pub use_tls: bool,
    pub insecure_skip_verify: bool,
    pub base_dn: String,
    /// Service account used for searches.
    pub bind_dn: String,
    pub bind_password: String,
    /// `%s` is replaced by the escaped username.
    pub user_filter: String,
    /// `%s` is replaced by the escaped user DN.
    pub group_filter: String,
    pub attributes: Vec<String>,
    /// Allowed groups; empty allows every directory user.
    pub groups: Vec<String>,
    pub connect_timeout_secs: u64,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 389,
            use_tls: false,
            insecure_skip_verify: false,
            base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: String::new(),
            user_filter: "(&(objectClass=User)(uid=%s))".to_string(),
            group_filter: "(&(objectClass=group)(member:1.2.840.113556.1.4.1941:=%s))".to_string(),
            attributes: vec!["mail".to_string(), "cn".to_string()],
            groups: Vec::new(),
            connect_timeout_secs: 5,
        }
    }
}

/// Email allow-list configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Allowed email domains; "*" allows any.
    pub email_domains: Vec<String>,

    /// Individually allowed addresses.
    pub authenticated_emails: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            email_domains: vec!["*".to_string()],
            authenticated_emails: Vec::new(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Upstream connection establishment timeout in seconds.
    pub upstream_connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_connect_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [cookie]
            secret = "s3cr3t"

            [proxy]
            upstreams = ["http://127.0.0.1:8080/"]
            "#,
        )
        .unwrap();

        assert_eq!(config.cookie.name, "_ldap_proxy");
        assert_eq!(config.cookie.expire_secs, 604_800);
        assert_eq!(config.proxy.prefix, "/ldap_proxy");
        assert_eq!(config.proxy.upstreams.len(), 1);
        assert_eq!(config.ldap.port, 389);
        assert_eq!(config.validator.email_domains, vec!["*".to_string()]);
        assert!(!config.skip_auth.preflight);
    }

    #[test]
    fn ldap_section_parses() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [ldap]
            enabled = true
            host = "ldap.example.com"
            port = 636
            use_tls = true
            base_dn = "dc=example,dc=com"
            groups = ["eng", "ops"]
            "#,
        )
        .unwrap();

        assert!(config.ldap.enabled);
        assert_eq!(config.ldap.groups, vec!["eng".to_string(), "ops".to_string()]);
        assert_eq!(config.ldap.attributes, vec!["mail".to_string(), "cn".to_string()]);
    }
}
