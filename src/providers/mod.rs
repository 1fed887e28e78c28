//! Credential providers subsystem.
//!
//! # Data Flow
//! ```text
//! sign-in form (username, password)
//!     → htpasswd.rs (local credential file, checked first)
//!     → directory.rs (LDAP bind + group lookup via ldap.rs)
//!     → GroupPolicy (directory users only)
//!
//! Authorization: Basic header
//!     → basic.rs (decode) → htpasswd.rs
//! ```
//!
//! # Design Decisions
//! - Providers never fail the request: errors degrade to "not authenticated"
//! - Directory connections are opened per attempt and always closed

pub mod basic;
pub mod directory;
pub mod htpasswd;
pub mod ldap;

use async_trait::async_trait;

pub use basic::{BasicAuthError, BasicAuthProvider};
pub use directory::{DirectoryClient, DirectoryConnector, DirectoryEntry, DirectoryError, DirectoryProvider};
pub use htpasswd::{HtpasswdError, HtpasswdFile};
pub use ldap::{LdapConnector, LdapSettings};

/// Identity returned by a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub email: Option<String>,
    /// Directory groups; `None` when the provider has no notion of groups
    /// or the lookup failed.
    pub groups: Option<Vec<String>>,
}

impl Identity {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            email: None,
            groups: None,
        }
    }
}

/// A source of truth for username/secret pairs.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Returns the identity when the credentials are valid.
    async fn authenticate(&self, user: &str, secret: &str) -> Option<Identity>;
}

/// Group allow-list applied to directory-authenticated users.
#[derive(Debug, Clone, Default)]
pub struct GroupPolicy {
    allowed: Vec<String>,
}

impl GroupPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn is_restricted(&self) -> bool {
        !self.allowed.is_empty()
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// An empty allow-list permits everyone; otherwise at least one group
    /// must match, ignoring case.
    pub fn permits(&self, groups: Option<&[String]>) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        groups.is_some_and(|groups| {
            self.allowed
                .iter()
                .any(|allowed| groups.iter().any(|g| g.eq_ignore_ascii_case(allowed)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_policy_permits_all() {
        let policy = GroupPolicy::default();
        assert!(policy.permits(None));
        assert!(policy.permits(Some(&groups(&["x"]))));
    }

    #[test]
    fn intersection_is_case_insensitive() {
        let policy = GroupPolicy::new(groups(&["Eng"]));
        assert!(policy.permits(Some(&groups(&["eng", "ops"]))));
        assert!(!policy.permits(Some(&groups(&["ops"]))));
    }

    #[test]
    fn missing_groups_fail_restricted_policy() {
        let policy = GroupPolicy::new(groups(&["admin"]));
        assert!(!policy.permits(None));
        assert!(!policy.permits(Some(&[])));
    }
}
