//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once by lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CookieConfig, HtpasswdConfig, LdapConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    SkipAuthConfig, TimeoutConfig, UpstreamConfig, ValidatorConfig,
};
pub use validation::{validate_config, ValidationError};
