//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → emitter → dispatcher → one channel per supplier
//!     → bind receiver → spawn channels → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → channels stop reconnecting → receiver drains → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The receiver binds before any channel connects
//! - In-flight local calls are not cancelled; their replies are dropped

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_handler;
pub use startup::{Relay, StartupError};
