//! LDAP adapter for the directory provider, built on `ldap3`.
//!
//! Authentication follows the usual search-then-bind flow: bind as the
//! service account, find exactly one entry with `user_filter`, bind as that
//! entry with the user's password, then re-bind as the service account so
//! the group search runs with its privileges.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};

use crate::config::LdapConfig;
use crate::providers::directory::{DirectoryClient, DirectoryConnector, DirectoryEntry, DirectoryError};

/// Result code for invalidCredentials.
const LDAP_INVALID_CREDENTIALS: u32 = 49;

/// Connection parameters, resolved once at startup.
#[derive(Debug, Clone)]
pub struct LdapSettings {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub insecure_skip_verify: bool,
    pub base_dn: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub user_filter: String,
    pub group_filter: String,
    pub attributes: Vec<String>,
    pub connect_timeout: Duration,
}

impl LdapSettings {
    pub fn from_config(config: &LdapConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            use_tls: config.use_tls,
            insecure_skip_verify: config.insecure_skip_verify,
            base_dn: config.base_dn.clone(),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_password.clone(),
            user_filter: config.user_filter.clone(),
            group_filter: config.group_filter.clone(),
            attributes: config.attributes.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Substitute an escaped value for every `%s` in a filter template.
pub fn render_filter(template: &str, value: &str) -> String {
    template.replace("%s", &ldap_escape(value))
}

/// Opens `ldap3` connections.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    settings: LdapSettings,
}

impl LdapConnector {
    pub fn new(settings: LdapSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn DirectoryClient>, DirectoryError> {
        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(self.settings.connect_timeout)
            .set_no_tls_verify(self.settings.insecure_skip_verify);

        let url = self.settings.url();
        let (conn, ldap) = LdapConnAsync::with_settings(conn_settings, &url)
            .await
            .map_err(|e| DirectoryError::Connect(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "LDAP connection terminated with error");
            }
        });

        tracing::debug!(url = %url, "Opened LDAP connection");
        Ok(Box::new(LdapClient {
            ldap,
            settings: self.settings.clone(),
        }))
    }
}

struct LdapClient {
    ldap: Ldap,
    settings: LdapSettings,
}

impl LdapClient {
    async fn bind_service_account(&mut self) -> Result<(), DirectoryError> {
        if self.settings.bind_dn.is_empty() {
            return Ok(());
        }
        self.ldap
            .simple_bind(&self.settings.bind_dn, &self.settings.bind_password)
            .await
            .and_then(|res| res.success())
            .map(|_| ())
            .map_err(|e| DirectoryError::Bind(e.to_string()))
    }
}

#[async_trait]
impl DirectoryClient for LdapClient {
    async fn authenticate(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<Option<DirectoryEntry>, DirectoryError> {
        self.bind_service_account().await?;

        let filter = render_filter(&self.settings.user_filter, user);
        let (entries, _) = self
            .ldap
            .search(
                &self.settings.base_dn,
                Scope::Subtree,
                &filter,
                self.settings.attributes.clone(),
            )
            .await
            .and_then(|res| res.success())
            .map_err(|e| DirectoryError::Search(e.to_string()))?;

        let entry = match entries.len() {
            0 => return Err(DirectoryError::UnknownUser(user.to_string())),
            1 => SearchEntry::construct(entries.into_iter().next().ok_or_else(|| {
                DirectoryError::UnknownUser(user.to_string())
            })?),
            _ => return Err(DirectoryError::AmbiguousUser(user.to_string())),
        };

        let result = self
            .ldap
            .simple_bind(&entry.dn, password)
            .await
            .map_err(|e| DirectoryError::Bind(e.to_string()))?;
        if result.rc == LDAP_INVALID_CREDENTIALS {
            return Ok(None);
        }
        result
            .success()
            .map_err(|e| DirectoryError::Bind(e.to_string()))?;

        self.bind_service_account().await?;

        let attributes: HashMap<String, Vec<String>> = entry.attrs;
        Ok(Some(DirectoryEntry {
            dn: entry.dn,
            attributes,
        }))
    }

    async fn groups_of_user(&mut self, dn: &str) -> Result<Vec<String>, DirectoryError> {
        let filter = render_filter(&self.settings.group_filter, dn);
        let (entries, _) = self
            .ldap
            .search(&self.settings.base_dn, Scope::Subtree, &filter, vec!["cn"])
            .await
            .and_then(|res| res.success())
            .map_err(|e| DirectoryError::Search(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .filter_map(|entry| entry.attrs.get("cn").and_then(|cn| cn.first().cloned()))
            .collect())
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            tracing::debug!(error = %e, "LDAP unbind failed");
        }
    }
}
