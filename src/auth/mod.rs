//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! request cookie / Authorization header
//!     → engine.rs (load, refresh, revalidate, expire, identity policy)
//!     → hooks.rs (SessionRefresher, SessionValidator, IdentityValidator)
//!     → AuthOutcome { decision, cookie effects }
//!     → headers.rs (identity headers on accept)
//!
//! sign-in form
//!     → sign_in.rs (htpasswd, then directory + group policy)
//! ```

pub mod engine;
pub mod headers;
pub mod hooks;
pub mod sign_in;

pub use engine::{AuthDecision, AuthEngine, AuthOutcome, AuthRequest, CookieEffect, SessionLifetime};
pub use headers::{inject_identity, strip_identity, TrustHeaderOptions, TRUST_HEADER};
pub use hooks::{
    AlwaysValid, EmailAllowList, IdentityValidator, NoRefresh, RefreshError, SessionRefresher,
    SessionValidator,
};
pub use sign_in::{SignInOutcome, SignInService};
