//! Cryptographic primitives subsystem.
//!
//! # Data Flow
//! ```text
//! secret material (config)
//!     → digest.rs (keyed MAC: cookie tags, outbound request signatures)
//!     → cipher.rs (AES-GCM payload encryption when cookie refresh is on)
//! ```
//!
//! # Design Decisions
//! - Keys are resolved once at startup; a key that cannot be used is fatal
//! - Tag comparison is always constant time

pub mod cipher;
pub mod digest;

pub use cipher::{CipherError, CookieCipher};
pub use digest::{HashAlgorithm, InvalidKey, UnknownAlgorithm};
