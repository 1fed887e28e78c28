//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check secrets, hash names and cookie cipher key sizes
//! - Check upstream URLs, bypass rules and the signature key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::crypto::{cipher, HashAlgorithm};
use crate::security::whitelist::parse_ip_range;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Check the whole configuration and report every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    validate_cookie(config, &mut errors);
    validate_proxy(config, &mut errors);
    validate_skip_auth(config, &mut errors);

    let ldap = &config.ldap;
    if ldap.enabled {
        if ldap.host.is_empty() {
            errors.push(ValidationError::new("ldap.host", "missing setting"));
        }
        if ldap.base_dn.is_empty() {
            errors.push(ValidationError::new("ldap.base_dn", "missing setting"));
        }
        if !ldap.user_filter.contains("%s") {
            errors.push(ValidationError::new("ldap.user_filter", "must contain %s"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.upstream_connect_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.upstream_connect_secs",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_cookie(config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    let cookie = &config.cookie;
    if cookie.name.is_empty() {
        errors.push(ValidationError::new("cookie.name", "missing setting"));
    }
    if cookie.secret.is_empty() {
        errors.push(ValidationError::new("cookie.secret", "missing setting"));
    }
    if let Err(e) = cookie.hash.parse::<HashAlgorithm>() {
        errors.push(ValidationError::new("cookie.hash", e.to_string()));
    }
    if cookie.expire_secs == 0 {
        errors.push(ValidationError::new("cookie.expire_secs", "must be greater than 0"));
    }
    if cookie.refresh_secs != 0 {
        if cookie.refresh_secs >= cookie.expire_secs {
            errors.push(ValidationError::new(
                "cookie.refresh_secs",
                format!(
                    "must be less than cookie.expire_secs ({} >= {})",
                    cookie.refresh_secs, cookie.expire_secs
                ),
            ));
        }
        let key = cipher::secret_bytes(&cookie.secret);
        if !matches!(key.len(), 16 | 24 | 32) && !cookie.secret.is_empty() {
            errors.push(ValidationError::new(
                "cookie.secret",
                format!(
                    "must be 16, 24 or 32 bytes to encrypt cookies, but is {} bytes",
                    key.len()
                ),
            ));
        }
    }
}

fn validate_proxy(config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    let proxy = &config.proxy;
    if !proxy.prefix.starts_with('/') || (proxy.prefix.len() > 1 && proxy.prefix.ends_with('/')) {
        errors.push(ValidationError::new(
            "proxy.prefix",
            "must start with '/' and must not end with '/'",
        ));
    }

    if proxy.upstreams.is_empty() {
        errors.push(ValidationError::new("proxy.upstreams", "missing setting"));
    }
    for upstream in &proxy.upstreams {
        match Url::parse(upstream) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => {}
            Ok(url) => errors.push(ValidationError::new(
                "proxy.upstreams",
                format!("unknown upstream protocol {:?} in {}", url.scheme(), upstream),
            )),
            Err(e) => errors.push(ValidationError::new(
                "proxy.upstreams",
                format!("error parsing {upstream:?}: {e}"),
            )),
        }
    }

    if let Some(key) = &proxy.signature_key {
        match key.split_once(':') {
            Some((algorithm, secret)) if !secret.is_empty() => {
                if let Err(e) = algorithm.parse::<HashAlgorithm>() {
                    errors.push(ValidationError::new("proxy.signature_key", e.to_string()));
                }
            }
            _ => errors.push(ValidationError::new(
                "proxy.signature_key",
                "must be of the form algorithm:secret",
            )),
        }
    }

    if proxy.max_body_bytes == 0 {
        errors.push(ValidationError::new("proxy.max_body_bytes", "must be greater than 0"));
    }
}

fn validate_skip_auth(config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    for pattern in &config.skip_auth.regex {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::new(
                "skip_auth.regex",
                format!("error compiling {pattern:?}: {e}"),
            ));
        }
    }
    for ip in &config.skip_auth.ips {
        if let Err(e) = parse_ip_range(ip) {
            errors.push(ValidationError::new("skip_auth.ips", e.to_string()));
        }
    }
}
