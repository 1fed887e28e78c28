//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, peer, host, redirect target)
//!     → handlers.rs (system paths, whitelist, engine, upstream)
//!     → cookies.rs (apply engine cookie effects)
//!     → pages.rs (sign-in and error pages)
//!     → response.rs (no-cache headers, redirects)
//!     → Send to client
//! ```

pub mod cookies;
pub mod handlers;
pub mod pages;
pub mod request;
pub mod response;
pub mod server;

pub use cookies::CookieSettings;
pub use handlers::SystemPaths;
pub use pages::{DefaultPages, PageRenderer};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
