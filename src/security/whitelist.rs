//! Authentication bypass rules.
//!
//! # Responsibilities
//! - Compile path regexes and IP ranges once at startup
//! - Decide whether a request skips authentication
//!
//! # Design Decisions
//! - Rules are evaluated with short-circuit OR in declaration order
//! - A bare IP address is a single-host range
//! - Immutable after construction; shared via `Arc` without locks

use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderMap, HeaderName, Method};
use ipnet::IpNet;
use regex::Regex;
use thiserror::Error;

use crate::config::SkipAuthConfig;
use crate::security::client_ip::ClientIpResolver;

#[derive(Debug, Error)]
pub enum WhitelistError {
    #[error("invalid skip_auth regex {pattern:?}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid skip_auth ip {0:?}: expected an address or CIDR range")]
    IpRange(String),

    #[error("invalid header name {0:?}")]
    HeaderName(String),
}

/// A single bypass rule.
#[derive(Debug, Clone)]
pub enum WhitelistRule {
    PathPattern(Regex),
    IpRange(IpNet),
}

/// Parse `10.0.0.0/8` or a bare `10.1.2.3`.
pub fn parse_ip_range(value: &str) -> Result<IpNet, WhitelistError> {
    let value = value.trim();
    if let Ok(net) = value.parse::<IpNet>() {
        return Ok(net);
    }
    value
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| WhitelistError::IpRange(value.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    rules: Vec<WhitelistRule>,
    allow_preflight: bool,
    resolver: ClientIpResolver,
}

impl Whitelist {
    pub fn new(rules: Vec<WhitelistRule>, allow_preflight: bool, resolver: ClientIpResolver) -> Self {
        Self {
            rules,
            allow_preflight,
            resolver,
        }
    }

    pub fn from_config(config: &SkipAuthConfig) -> Result<Self, WhitelistError> {
        let mut rules = Vec::with_capacity(config.regex.len() + config.ips.len());
        for pattern in &config.regex {
            let regex = Regex::new(pattern).map_err(|source| WhitelistError::Regex {
                pattern: pattern.clone(),
                source,
            })?;
            tracing::info!(pattern = %pattern, "Compiled skip-auth regex");
            rules.push(WhitelistRule::PathPattern(regex));
        }
        for ip in &config.ips {
            let net = parse_ip_range(ip)?;
            tracing::info!(range = %net, "Skipping auth for address range");
            rules.push(WhitelistRule::IpRange(net));
        }

        let resolver = ClientIpResolver::new(
            header_name(config.real_ip_header.as_deref())?,
            header_name(config.proxy_ip_header.as_deref())?,
        );

        Ok(Self::new(rules, config.preflight, resolver))
    }

    pub fn resolver(&self) -> &ClientIpResolver {
        &self.resolver
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && !self.allow_preflight
    }

    pub fn is_bypassed(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
    ) -> bool {
        if self.allow_preflight && method == Method::OPTIONS {
            return true;
        }
        if self.matches_path(path) {
            return true;
        }
        match self.resolver.resolve(headers, peer) {
            Some(ip) => self.matches_ip(ip),
            None => false,
        }
    }

    fn matches_path(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| match rule {
            WhitelistRule::PathPattern(regex) => regex.is_match(path),
            WhitelistRule::IpRange(_) => false,
        })
    }

    fn matches_ip(&self, ip: IpAddr) -> bool {
        self.rules.iter().any(|rule| match rule {
            WhitelistRule::IpRange(net) => net.contains(&ip),
            WhitelistRule::PathPattern(_) => false,
        })
    }
}

fn header_name(value: Option<&str>) -> Result<Option<HeaderName>, WhitelistError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(name) => HeaderName::from_bytes(name.as_bytes())
            .map(Some)
            .map_err(|_| WhitelistError::HeaderName(name.to_string())),
        None => Ok(None),
    }
}
