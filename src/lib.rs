//! LDAP authenticating reverse proxy library.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod providers;
pub mod routing;
pub mod security;
pub mod session;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, Startup};
