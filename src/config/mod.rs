//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file (--config / RELAY_CONFIG)
//!     → loader.rs (parse & deserialize)
//!     → environment overlay (SERVER_URL, SUPPLIERS, ...)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; supplier identities never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Tenancy picks the defaults for local API, callback route and credential
//! - A config that fails validation stops the process before anything starts

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AckStyle, CallbackRoute, CredentialPlacement, LocalApiMode, LogFormat, RelayConfig,
    SupplierIdentity, Tenancy,
};
