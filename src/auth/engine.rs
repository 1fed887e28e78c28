//! Per-request authentication decision.
//!
//! # Responsibilities
//! - Load the session from the request cookie
//! - Apply refresh, revalidation, expiry and identity policy in order
//! - Fall back to Basic-Auth credentials when no session survives
//! - Report the decision plus the cookie side effects to apply
//!
//! # Design Decisions
//! - No HTTP types: the dispatcher maps the outcome onto a response
//! - Expiry always wins over a pending refresh
//! - Cookie effects are returned, never written

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::auth::hooks::{
    AlwaysValid, EmailAllowList, IdentityValidator, NoRefresh, SessionRefresher, SessionValidator,
};
use crate::providers::BasicAuthProvider;
use crate::session::{LoadedSession, SessionSealer, SessionState};

/// What the engine needs from the inbound request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthRequest<'a> {
    /// Raw value of the session cookie, if sent.
    pub cookie: Option<&'a str>,
    /// Raw `Authorization` header, if sent.
    pub authorization: Option<&'a str>,
    /// Client description for logs.
    pub remote: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Accept(SessionState),
    Reject,
    InternalError,
}

/// Cookie mutation requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieEffect {
    /// Issue the session cookie with this signed value.
    Set(String),
    /// Expire the session cookie.
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub decision: AuthDecision,
    pub effects: Vec<CookieEffect>,
}

impl AuthOutcome {
    fn internal_error() -> Self {
        Self {
            decision: AuthDecision::InternalError,
            effects: Vec::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.decision, AuthDecision::Accept(_))
    }
}

/// Cookie lifetime policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLifetime {
    /// Maximum age of a cookie before the session is dropped.
    pub expire: Duration,
    /// Re-issue cookies older than this; zero disables refresh.
    pub refresh: Duration,
}

/// The authentication state machine.
pub struct AuthEngine {
    sealer: Arc<SessionSealer>,
    lifetime: SessionLifetime,
    refresher: Arc<dyn SessionRefresher>,
    validator: Arc<dyn SessionValidator>,
    identity: Arc<dyn IdentityValidator>,
    basic_auth: Option<BasicAuthProvider>,
}

impl AuthEngine {
    pub fn new(sealer: Arc<SessionSealer>, lifetime: SessionLifetime) -> Self {
        Self {
            sealer,
            lifetime,
            refresher: Arc::new(NoRefresh),
            validator: Arc::new(AlwaysValid),
            identity: Arc::new(EmailAllowList::any()),
            basic_auth: None,
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn SessionRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    pub fn with_session_validator(mut self, validator: Arc<dyn SessionValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_identity_validator(mut self, identity: Arc<dyn IdentityValidator>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_basic_auth(mut self, provider: Option<BasicAuthProvider>) -> Self {
        self.basic_auth = provider;
        self
    }

    pub fn sealer(&self) -> &SessionSealer {
        &self.sealer
    }

    pub fn lifetime(&self) -> SessionLifetime {
        self.lifetime
    }

    pub async fn authenticate(&self, request: &AuthRequest<'_>, now: OffsetDateTime) -> AuthOutcome {
        let remote = request.remote;
        let mut effects = Vec::new();
        let mut save = false;
        let mut clear = false;
        let mut revalidated = false;

        let (mut session, age) = match self.load(request.cookie, now, remote) {
            Some(LoadedSession { session, age }) => (Some(session), age),
            None => (None, Duration::ZERO),
        };

        if let Some(s) = &session {
            if !self.lifetime.refresh.is_zero() && age > self.lifetime.refresh {
                tracing::info!(
                    remote = %remote,
                    session = %s,
                    age_secs = age.as_secs(),
                    refresh_secs = self.lifetime.refresh.as_secs(),
                    "Refreshing session cookie"
                );
                save = true;
            }
        }

        if let Some(s) = session.as_mut() {
            match self.refresher.refresh_if_needed(s).await {
                Ok(true) => {
                    save = true;
                    revalidated = true;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::info!(remote = %remote, session = %s, error = %e, "Removing session: refresh failed");
                    session = None;
                    clear = true;
                }
            }
        }

        if save && !revalidated {
            if let Some(s) = &session {
                if !self.validator.validate(s).await {
                    tracing::info!(remote = %remote, session = %s, "Removing session: validation failed");
                    session = None;
                    save = false;
                    clear = true;
                }
            }
        }

        if let Some(s) = &session {
            if age > self.lifetime.expire {
                tracing::info!(remote = %remote, session = %s, age_secs = age.as_secs(), "Removing session: cookie expired");
                session = None;
                save = false;
                clear = true;
            }
        }

        if let Some(s) = &session {
            if let Some(email) = s.email.as_deref().filter(|e| !e.is_empty()) {
                if !self.identity.allows(email) {
                    tracing::warn!(remote = %remote, session = %s, "Permission denied: removing session");
                    session = None;
                    save = false;
                    clear = true;
                }
            }
        }

        if save {
            if let Some(s) = &session {
                match self.sealer.seal(s, now) {
                    Ok(value) => effects.push(CookieEffect::Set(value)),
                    Err(e) => {
                        tracing::error!(remote = %remote, error = %e, "Failed to re-issue session cookie");
                        return AuthOutcome::internal_error();
                    }
                }
            }
        }

        if clear {
            effects.push(CookieEffect::Clear);
        }

        if session.is_none() {
            session = self.check_basic_auth(request.authorization, remote).await;
        }

        let decision = match session {
            Some(s) => AuthDecision::Accept(s),
            None => AuthDecision::Reject,
        };
        AuthOutcome { decision, effects }
    }

    fn load(&self, cookie: Option<&str>, now: OffsetDateTime, remote: &str) -> Option<LoadedSession> {
        let token = cookie.filter(|c| !c.is_empty())?;
        match self.sealer.open(token, now) {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                tracing::info!(remote = %remote, error = %e, "Ignoring invalid session cookie");
                None
            }
        }
    }

    async fn check_basic_auth(&self, header: Option<&str>, remote: &str) -> Option<SessionState> {
        let provider = self.basic_auth.as_ref()?;
        let header = header.filter(|h| !h.is_empty())?;
        match provider.authenticate_header(header).await {
            Ok(identity) => Some(SessionState::new(identity.user)),
            Err(e) => {
                tracing::info!(remote = %remote, error = %e, "Basic auth failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hooks::RefreshError;
    use crate::crypto::HashAlgorithm;
    use crate::providers::HtpasswdFile;
    use crate::session::CookieCodec;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use sha1::{Digest, Sha1};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    fn sealer() -> Arc<SessionSealer> {
        Arc::new(SessionSealer::new(
            "_lap",
            CookieCodec::new("secret", HashAlgorithm::Sha256),
            None,
        ))
    }

    fn engine(refresh: Duration) -> AuthEngine {
        AuthEngine::new(
            sealer(),
            SessionLifetime {
                expire: 168 * HOUR,
                refresh,
            },
        )
    }

    fn cookie_for(session: &SessionState, issued: i64) -> String {
        sealer().seal(session, at(issued)).unwrap()
    }

    struct FailingRefresh;

    #[async_trait]
    impl SessionRefresher for FailingRefresh {
        async fn refresh_if_needed(&self, _s: &mut SessionState) -> Result<bool, RefreshError> {
            Err(RefreshError("token revoked".into()))
        }
    }

    struct RefreshingBackend;

    #[async_trait]
    impl SessionRefresher for RefreshingBackend {
        async fn refresh_if_needed(&self, _s: &mut SessionState) -> Result<bool, RefreshError> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct CountingValidator {
        calls: AtomicUsize,
        verdict: bool,
    }

    #[async_trait]
    impl SessionValidator for CountingValidator {
        async fn validate(&self, _s: &SessionState) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }
    }

    #[tokio::test]
    async fn valid_cookie_is_accepted_without_side_effects() {
        let session = SessionState::new("alice");
        let cookie = cookie_for(&session, 1_000);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };

        let outcome = engine(Duration::ZERO).authenticate(&request, at(1_060)).await;
        assert_eq!(outcome.decision, AuthDecision::Accept(session));
        assert!(outcome.effects.is_empty());
    }

    #[tokio::test]
    async fn missing_or_forged_cookie_is_rejected() {
        let outcome = engine(Duration::ZERO).authenticate(&AuthRequest::default(), at(0)).await;
        assert_eq!(outcome.decision, AuthDecision::Reject);

        let forged = SessionSealer::new("_lap", CookieCodec::new("other", HashAlgorithm::Sha256), None)
            .seal(&SessionState::new("alice"), at(0))
            .unwrap();
        let request = AuthRequest { cookie: Some(&forged), ..Default::default() };
        let outcome = engine(Duration::ZERO).authenticate(&request, at(0)).await;
        assert_eq!(outcome.decision, AuthDecision::Reject);
        assert!(outcome.effects.is_empty());
    }

    #[tokio::test]
    async fn refresh_disabled_never_reissues() {
        let cookie = cookie_for(&SessionState::new("alice"), 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let outcome = engine(Duration::ZERO).authenticate(&request, at(100 * 3600)).await;
        assert!(outcome.is_accepted());
        assert!(outcome.effects.is_empty());
    }

    #[tokio::test]
    async fn old_cookie_is_reissued_once_with_fresh_timestamp() {
        let session = SessionState::new("alice");
        let cookie = cookie_for(&session, 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let now = at(2 * 3600);

        let outcome = engine(HOUR).authenticate(&request, now).await;
        assert_eq!(outcome.decision, AuthDecision::Accept(session));
        assert_eq!(outcome.effects.len(), 1);
        match &outcome.effects[0] {
            CookieEffect::Set(value) => {
                assert_eq!(sealer().open(value, now).unwrap().age, Duration::ZERO);
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[tokio::test]
    async fn young_cookie_is_not_reissued() {
        let cookie = cookie_for(&SessionState::new("alice"), 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let outcome = engine(HOUR).authenticate(&request, at(60)).await;
        assert!(outcome.effects.is_empty());
    }

    #[tokio::test]
    async fn refresh_error_clears_session() {
        let cookie = cookie_for(&SessionState::new("alice"), 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let outcome = engine(HOUR)
            .with_refresher(Arc::new(FailingRefresh))
            .authenticate(&request, at(2 * 3600))
            .await;
        assert_eq!(outcome.decision, AuthDecision::Reject);
        assert_eq!(outcome.effects, vec![CookieEffect::Clear]);
    }

    #[tokio::test]
    async fn provider_revalidation_skips_local_validation() {
        let validator = Arc::new(CountingValidator::default());
        let cookie = cookie_for(&SessionState::new("alice"), 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let outcome = engine(HOUR)
            .with_refresher(Arc::new(RefreshingBackend))
            .with_session_validator(validator.clone())
            .authenticate(&request, at(60))
            .await;
        assert!(outcome.is_accepted());
        assert!(matches!(outcome.effects.as_slice(), [CookieEffect::Set(_)]));
        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_local_validation_clears_session() {
        let validator = Arc::new(CountingValidator { calls: AtomicUsize::new(0), verdict: false });
        let cookie = cookie_for(&SessionState::new("alice"), 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let outcome = engine(HOUR)
            .with_session_validator(validator.clone())
            .authenticate(&request, at(2 * 3600))
            .await;
        assert_eq!(outcome.decision, AuthDecision::Reject);
        assert_eq!(outcome.effects, vec![CookieEffect::Clear]);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expiry_wins_over_pending_refresh() {
        let cookie = cookie_for(&SessionState::new("alice"), 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let outcome = engine(HOUR).authenticate(&request, at(169 * 3600)).await;
        assert_eq!(outcome.decision, AuthDecision::Reject);
        assert_eq!(outcome.effects, vec![CookieEffect::Clear]);
    }

    #[tokio::test]
    async fn identity_policy_denies_valid_cookie() {
        let session = SessionState::new("x").with_email("x@y.com");
        let cookie = cookie_for(&session, 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let outcome = engine(Duration::ZERO)
            .with_identity_validator(Arc::new(EmailAllowList::new(["example.com"], std::iter::empty::<&str>())))
            .authenticate(&request, at(10))
            .await;
        assert_eq!(outcome.decision, AuthDecision::Reject);
        assert_eq!(outcome.effects, vec![CookieEffect::Clear]);
    }

    #[tokio::test]
    async fn identity_policy_ignores_sessions_without_email() {
        let cookie = cookie_for(&SessionState::new("alice"), 0);
        let request = AuthRequest { cookie: Some(&cookie), ..Default::default() };
        let outcome = engine(Duration::ZERO)
            .with_identity_validator(Arc::new(EmailAllowList::new(["example.com"], std::iter::empty::<&str>())))
            .authenticate(&request, at(10))
            .await;
        assert!(outcome.is_accepted());
    }

    #[tokio::test]
    async fn basic_auth_fallback() {
        let line = format!("alice:{{SHA}}{}", STANDARD.encode(Sha1::digest(b"correct")));
        let provider = BasicAuthProvider::new(Arc::new(HtpasswdFile::parse(&line)));
        let engine = engine(Duration::ZERO).with_basic_auth(Some(provider));

        let good = format!("Basic {}", STANDARD.encode("alice:correct"));
        let request = AuthRequest { authorization: Some(&good), ..Default::default() };
        let outcome = engine.authenticate(&request, at(0)).await;
        assert_eq!(outcome.decision, AuthDecision::Accept(SessionState::new("alice")));

        let bad = "Basic %%%";
        let request = AuthRequest { authorization: Some(bad), ..Default::default() };
        assert_eq!(engine.authenticate(&request, at(0)).await.decision, AuthDecision::Reject);
    }

    #[tokio::test]
    async fn expired_cookie_with_basic_auth_clears_and_accepts() {
        let line = format!("alice:{{SHA}}{}", STANDARD.encode(Sha1::digest(b"correct")));
        let provider = BasicAuthProvider::new(Arc::new(HtpasswdFile::parse(&line)));
        let cookie = cookie_for(&SessionState::new("alice"), 0);
        let auth = format!("Basic {}", STANDARD.encode("alice:correct"));
        let request = AuthRequest {
            cookie: Some(&cookie),
            authorization: Some(&auth),
            remote: "127.0.0.1",
        };
        let outcome = engine(Duration::ZERO)
            .with_basic_auth(Some(provider))
            .authenticate(&request, at(200 * 3600))
            .await;
        assert!(outcome.is_accepted());
        assert_eq!(outcome.effects, vec![CookieEffect::Clear]);
    }
}
