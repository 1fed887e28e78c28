//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup)
//!     → matcher.rs (exact or subtree mount, longest wins)
//!     → upstream.rs (reverse proxy or file server)
//!     → signer.rs (LAP-Signature on proxied requests)
//!
//! Route Compilation (at startup):
//!     upstream URLs
//!     → scheme selects target (http/https, file)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Unknown upstream schemes are fatal at startup

pub mod matcher;
pub mod router;
pub mod signer;
pub mod upstream;

pub use router::{Router, RouterError, RouterOptions, UpstreamRoute};
pub use signer::{RequestSigner, SignerError, SIGNATURE_HEADER};
pub use upstream::{FileServerTarget, ReverseProxyTarget, UpstreamTarget, UPSTREAM_ADDRESS_HEADER};
