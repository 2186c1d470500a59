//! Supplier relay library.
//!
//! Bridges a central server's Socket.IO channel to a supplier's local API
//! and forwards legacy HTTP callbacks back to the central server.

pub mod callback;
pub mod channel;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod lifecycle;
pub mod observability;
pub mod receiver;

pub use config::schema::RelayConfig;
pub use lifecycle::{Relay, Shutdown};
