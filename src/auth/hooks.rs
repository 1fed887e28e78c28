//! Pluggable policy hooks consulted by the authentication engine.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::SessionState;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("session refresh failed: {0}")]
pub struct RefreshError(pub String);

/// Out-of-band session refresh against an identity backend.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// `Ok(true)` when the backend refreshed and revalidated the session.
    /// An error forces the user to sign in again.
    async fn refresh_if_needed(&self, session: &mut SessionState) -> Result<bool, RefreshError>;
}

/// Local validity check run before a refreshed cookie is re-issued.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, session: &SessionState) -> bool;
}

/// Decides whether an email address may use the proxy.
pub trait IdentityValidator: Send + Sync {
    fn allows(&self, email: &str) -> bool;
}

/// Never refreshes, never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefresh;

#[async_trait]
impl SessionRefresher for NoRefresh {
    async fn refresh_if_needed(&self, _session: &mut SessionState) -> Result<bool, RefreshError> {
        Ok(false)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysValid;

#[async_trait]
impl SessionValidator for AlwaysValid {
    async fn validate(&self, _session: &SessionState) -> bool {
        true
    }
}

/// Email allow-list: permitted domains (`*` for any) plus explicit addresses.
#[derive(Debug, Clone, Default)]
pub struct EmailAllowList {
    any_domain: bool,
    domains: Vec<String>,
    emails: HashSet<String>,
}

impl EmailAllowList {
    pub fn new<D, E>(domains: D, emails: E) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mut any_domain = false;
        let mut normalized = Vec::new();
        for domain in domains {
            let domain = domain.as_ref().trim().to_ascii_lowercase();
            if domain == "*" {
                any_domain = true;
            } else if !domain.is_empty() {
                normalized.push(format!("@{}", domain.trim_start_matches('@')));
            }
        }
        Self {
            any_domain,
            domains: normalized,
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Accepts any address.
    pub fn any() -> Self {
        Self::new(["*"], std::iter::empty::<&str>())
    }
}

impl IdentityValidator for EmailAllowList {
    fn allows(&self, email: &str) -> bool {
        let email = email.trim().to_ascii_lowercase();
        if email.is_empty() {
            return false;
        }
        self.any_domain
            || self.emails.contains(&email)
            || self.domains.iter().any(|d| email.ends_with(d.as_str()))
    }
}
