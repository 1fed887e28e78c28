//! Form sign-in: local credential file first, then the directory.

use std::sync::Arc;

use crate::observability::metrics;
use crate::providers::{CredentialProvider, DirectoryProvider, GroupPolicy, HtpasswdFile, Identity};
use crate::session::SessionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    Authenticated(SessionState),
    /// No provider accepted the credentials.
    Failed,
    /// The directory accepted the user but the group policy did not.
    Denied,
}

/// Runs the configured providers in precedence order.
#[derive(Debug, Clone, Default)]
pub struct SignInService {
    htpasswd: Option<Arc<HtpasswdFile>>,
    directory: Option<DirectoryProvider>,
    groups: GroupPolicy,
}

impl SignInService {
    pub fn new(
        htpasswd: Option<Arc<HtpasswdFile>>,
        directory: Option<DirectoryProvider>,
        groups: GroupPolicy,
    ) -> Self {
        Self {
            htpasswd,
            directory,
            groups,
        }
    }

    pub async fn sign_in(&self, user: &str, password: &str, remote: &str) -> SignInOutcome {
        if let Some(file) = &self.htpasswd {
            if let Some(identity) = file.authenticate(user, password).await {
                tracing::info!(remote = %remote, user = %user, "Authenticated via htpasswd file");
                metrics::record_sign_in(file.name(), "success");
                return SignInOutcome::Authenticated(session_for(identity));
            }
        }

        let Some(directory) = &self.directory else {
            tracing::info!(remote = %remote, user = %user, "Sign-in failed");
            metrics::record_sign_in("none", "failure");
            return SignInOutcome::Failed;
        };

        let Some(identity) = directory.authenticate(user, password).await else {
            tracing::info!(remote = %remote, user = %user, "Sign-in failed");
            metrics::record_sign_in(directory.name(), "failure");
            return SignInOutcome::Failed;
        };

        if !self.groups.permits(identity.groups.as_deref()) {
            tracing::warn!(
                remote = %remote,
                user = %user,
                groups = ?identity.groups,
                allowed = ?self.groups.allowed(),
                "Permission denied: user is not in an allowed group"
            );
            metrics::record_sign_in(directory.name(), "denied");
            return SignInOutcome::Denied;
        }

        metrics::record_sign_in(directory.name(), "success");
        SignInOutcome::Authenticated(session_for(identity))
    }
}

fn session_for(identity: Identity) -> SessionState {
    let session = SessionState::new(identity.user);
    match identity.email {
        Some(email) => session.with_email(email),
        None => session,
    }
}
