//! Session cookie subsystem.
//!
//! # Data Flow
//! ```text
//! SessionState
//!     → state.rs (plaintext payload "email:<e> user:<u>")
//!     → crypto::cipher (optional AES-GCM)
//!     → codec.rs (timestamp + MAC, base64url)
//!     → Set-Cookie value
//!
//! Cookie header value → reverse of the above → LoadedSession { session, age }
//! ```
//!
//! # Design Decisions
//! - The cookie is the session; nothing is stored server side
//! - Verification is all-or-nothing

pub mod codec;
pub mod sealer;
pub mod state;

pub use codec::{CookieCodec, CookieError, MAX_COOKIE_BYTES};
pub use sealer::{LoadedSession, SessionError, SessionSealer};
pub use state::SessionState;
