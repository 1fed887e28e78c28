//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (real-IP header, proxy-IP header, peer)
//!     → whitelist.rs (preflight, path regex, IP range)
//!     → bypassed requests go straight to routing
//!
//! Proxied request/response:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For)
//! ```
//!
//! # Design Decisions
//! - Bypass rules are compiled once and never mutated
//! - Client-supplied address headers are trusted only when configured

pub mod client_ip;
pub mod headers;
pub mod whitelist;

pub use client_ip::ClientIpResolver;
pub use whitelist::{parse_ip_range, Whitelist, WhitelistError, WhitelistRule};
