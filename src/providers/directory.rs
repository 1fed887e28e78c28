//! Directory (LDAP) credential provider.
//!
//! # Responsibilities
//! - Open one directory connection per sign-in attempt
//! - Bind with the supplied credentials and resolve the user's DN
//! - Fetch group memberships for the group policy
//! - Close the connection on every exit path
//!
//! The wire protocol lives behind [`DirectoryConnector`] and
//! [`DirectoryClient`]; `ldap.rs` provides the production adapter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::providers::{CredentialProvider, Identity};

#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("failed to connect to directory: {0}")]
    Connect(String),

    #[error("directory bind failed: {0}")]
    Bind(String),

    #[error("directory search failed: {0}")]
    Search(String),

    #[error("user {0} does not exist")]
    UnknownUser(String),

    #[error("too many entries returned for user {0}")]
    AmbiguousUser(String),
}

/// A directory entry resolved for an authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First value of `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// An open directory session.
#[async_trait]
pub trait DirectoryClient: Send {
    /// Bind as `user`. `Ok(None)` means the directory rejected the credentials.
    async fn authenticate(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<Option<DirectoryEntry>, DirectoryError>;

    /// Group names the entry at `dn` belongs to.
    async fn groups_of_user(&mut self, dn: &str) -> Result<Vec<String>, DirectoryError>;

    /// Release the connection.
    async fn close(&mut self);
}

/// Opens directory sessions.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DirectoryClient>, DirectoryError>;
}

/// Credential provider backed by a directory server.
#[derive(Clone)]
pub struct DirectoryProvider {
    connector: Arc<dyn DirectoryConnector>,
}

impl std::fmt::Debug for DirectoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryProvider").finish_non_exhaustive()
    }
}

impl DirectoryProvider {
    pub fn new(connector: Arc<dyn DirectoryConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl CredentialProvider for DirectoryProvider {
    fn name(&self) -> &'static str {
        "ldap"
    }

    async fn authenticate(&self, user: &str, secret: &str) -> Option<Identity> {
        // An empty password would turn into an unauthenticated bind.
        if user.is_empty() || secret.is_empty() {
            return None;
        }

        let mut client = match self.connector.connect().await {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open directory connection");
                return None;
            }
        };

        let identity = bind_and_lookup(client.as_mut(), user, secret).await;
        client.close().await;
        identity
    }
}

async fn bind_and_lookup(
    client: &mut dyn DirectoryClient,
    user: &str,
    password: &str,
) -> Option<Identity> {
    let entry = match client.authenticate(user, password).await {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            tracing::info!(user = %user, "Directory rejected credentials");
            return None;
        }
        Err(e) => {
            tracing::warn!(user = %user, error = %e, "Error authenticating user");
            return None;
        }
    };
    tracing::info!(user = %user, dn = %entry.dn, "Authenticated via LDAP");

    let groups = match client.groups_of_user(&entry.dn).await {
        Ok(groups) => Some(groups),
        Err(e) => {
            tracing::warn!(user = %user, error = %e, "Error getting groups for user");
            None
        }
    };

    Some(Identity {
        user: user.to_string(),
        email: entry.first("mail").map(str::to_string),
        groups,
    })
}
