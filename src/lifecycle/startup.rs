//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve keys, credential files and upstreams from configuration
//! - Initialize subsystems in dependency order
//! - Assemble the shared application state
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Hooks and the directory connector are injectable for tests and embedders

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::{
    AuthEngine, EmailAllowList, IdentityValidator, SessionLifetime, SessionRefresher, SessionValidator,
    SignInService, TrustHeaderOptions,
};
use crate::config::ProxyConfig;
use crate::crypto::{cipher, CipherError, CookieCipher, HashAlgorithm, UnknownAlgorithm};
use crate::http::{AppState, CookieSettings, DefaultPages, PageRenderer, SystemPaths};
use crate::providers::{
    BasicAuthProvider, DirectoryConnector, DirectoryProvider, GroupPolicy, HtpasswdError, HtpasswdFile,
    LdapConnector, LdapSettings,
};
use crate::routing::{RequestSigner, Router as ProxyRouter, RouterError, RouterOptions, SignerError};
use crate::security::{Whitelist, WhitelistError};
use crate::session::{CookieCodec, SessionSealer};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cookie hash: {0}")]
    Hash(#[from] UnknownAlgorithm),

    #[error("cookie secret cannot be used for encryption: {0}")]
    Cipher(#[from] CipherError),

    #[error("htpasswd file: {0}")]
    Htpasswd(#[from] HtpasswdError),

    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error("signature key: {0}")]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Builds [`AppState`] from a validated configuration.
pub struct Startup {
    config: ProxyConfig,
    directory: Option<Arc<dyn DirectoryConnector>>,
    refresher: Option<Arc<dyn SessionRefresher>>,
    session_validator: Option<Arc<dyn SessionValidator>>,
    identity_validator: Option<Arc<dyn IdentityValidator>>,
    pages: Option<Arc<dyn PageRenderer>>,
}

impl Startup {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            directory: None,
            refresher: None,
            session_validator: None,
            identity_validator: None,
            pages: None,
        }
    }

    /// Use this connector instead of the LDAP one built from `[ldap]`.
    pub fn directory(mut self, connector: Arc<dyn DirectoryConnector>) -> Self {
        self.directory = Some(connector);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn SessionRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn session_validator(mut self, validator: Arc<dyn SessionValidator>) -> Self {
        self.session_validator = Some(validator);
        self
    }

    pub fn identity_validator(mut self, validator: Arc<dyn IdentityValidator>) -> Self {
        self.identity_validator = Some(validator);
        self
    }

    pub fn pages(mut self, pages: Arc<dyn PageRenderer>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn build(self) -> Result<AppState, StartupError> {
        let config = &self.config;
        let cookie = &config.cookie;

        let algorithm: HashAlgorithm = cookie.hash.parse()?;
        let refresh = Duration::from_secs(cookie.refresh_secs);
        let expire = Duration::from_secs(cookie.expire_secs);

        let cipher = if refresh.is_zero() {
            None
        } else {
            Some(CookieCipher::new(&cipher::secret_bytes(&cookie.secret))?)
        };
        let codec = CookieCodec::new(cookie.secret.as_bytes(), algorithm);
        let sealer = Arc::new(SessionSealer::new(cookie.name.clone(), codec, cipher));

        let refresh_desc = if refresh.is_zero() {
            "disabled".to_string()
        } else {
            format!("after {}s", cookie.refresh_secs)
        };
        tracing::info!(
            name = %cookie.name,
            secure = cookie.secure,
            http_only = cookie.http_only,
            expire_secs = cookie.expire_secs,
            domain = %cookie.domain.as_deref().unwrap_or("<default>"),
            refresh = %refresh_desc,
            "Cookie settings"
        );

        let htpasswd = match config.htpasswd.file.as_deref().filter(|f| !f.is_empty()) {
            Some(path) => Some(Arc::new(HtpasswdFile::load(Path::new(path))?)),
            None => None,
        };

        let directory = match (self.directory, config.ldap.enabled) {
            (Some(connector), _) => Some(DirectoryProvider::new(connector)),
            (None, true) => {
                let settings = LdapSettings::from_config(&config.ldap);
                tracing::info!(url = %settings.url(), base_dn = %settings.base_dn, "LDAP sign-in enabled");
                Some(DirectoryProvider::new(Arc::new(LdapConnector::new(settings))))
            }
            (None, false) => None,
        };

        let identity = self.identity_validator.unwrap_or_else(|| {
            Arc::new(EmailAllowList::new(
                &config.validator.email_domains,
                &config.validator.authenticated_emails,
            ))
        });

        let mut engine = AuthEngine::new(sealer, SessionLifetime { expire, refresh })
            .with_identity_validator(identity)
            .with_basic_auth(htpasswd.clone().map(BasicAuthProvider::new));
        if let Some(refresher) = self.refresher {
            engine = engine.with_refresher(refresher);
        }
        if let Some(validator) = self.session_validator {
            engine = engine.with_session_validator(validator);
        }

        let sign_in = SignInService::new(htpasswd, directory, GroupPolicy::new(config.ldap.groups.clone()));

        let whitelist = Whitelist::from_config(&config.skip_auth)?;

        let signer = config
            .proxy
            .signature_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(RequestSigner::from_key_spec)
            .transpose()?;
        let router = ProxyRouter::from_upstreams(
            &config.proxy.upstreams,
            RouterOptions {
                pass_host_header: config.proxy.pass_host_header,
                signer,
                max_body_bytes: config.proxy.max_body_bytes,
                connect_timeout: Duration::from_secs(config.timeouts.upstream_connect_secs),
            },
        )?;

        let pages = self.pages.unwrap_or_else(|| {
            Arc::new(DefaultPages::new(
                config.proxy.prefix.clone(),
                config.proxy.sign_in_message.clone(),
                config.proxy.footer.clone(),
            ))
        });

        Ok(AppState {
            paths: Arc::new(SystemPaths::new(&config.proxy.prefix)),
            engine: Arc::new(engine),
            sign_in: Arc::new(sign_in),
            whitelist: Arc::new(whitelist),
            router: Arc::new(router),
            cookies: Arc::new(CookieSettings::from_config(cookie)),
            trust: Arc::new(TrustHeaderOptions {
                pass_basic_auth: config.proxy.pass_basic_auth,
                basic_auth_password: config.proxy.basic_auth_password.clone(),
                pass_user_headers: config.proxy.pass_user_headers,
                set_xauthrequest: config.proxy.set_xauthrequest,
            }),
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.cookie.secret = "0123456789abcdef".to_string();
        config.proxy.upstreams = vec!["http://127.0.0.1:9/".to_string()];
        config
    }

    #[test]
    fn builds_from_minimal_config() {
        let state = Startup::new(config()).build().unwrap();
        assert_eq!(state.paths.sign_in, "/ldap_proxy/sign_in");
        assert!(!state.engine.sealer().encrypts());
        assert_eq!(state.router.routes().len(), 1);
    }

    #[test]
    fn refresh_enables_encryption() {
        let mut config = config();
        config.cookie.refresh_secs = 60;
        let state = Startup::new(config).build().unwrap();
        assert!(state.engine.sealer().encrypts());
    }

    #[test]
    fn unusable_cipher_key_is_fatal() {
        let mut config = config();
        config.cookie.refresh_secs = 60;
        config.cookie.secret = "too-short".to_string();
        assert!(matches!(Startup::new(config).build(), Err(StartupError::Cipher(_))));
    }

    #[test]
    fn unknown_upstream_scheme_is_fatal() {
        let mut config = config();
        config.proxy.upstreams = vec!["gopher://example.com/".to_string()];
        assert!(matches!(
            Startup::new(config).build(),
            Err(StartupError::Router(RouterError::UnknownScheme { .. }))
        ));
    }

    #[test]
    fn missing_htpasswd_file_is_fatal() {
        let mut config = config();
        config.htpasswd.file = Some("/nonexistent/htpasswd".to_string());
        assert!(matches!(Startup::new(config).build(), Err(StartupError::Htpasswd(_))));
    }
}
