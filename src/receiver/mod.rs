//! Legacy callback receiver.
//!
//! # Data Flow
//! ```text
//! legacy software ── HTTP ──→ server.rs
//!     /callback        → body.rs (raw bytes first, then parse) → WINDOWS_CALLBACK
//!     /<anything>      → decoded path                          → SUPPLIER_PATH_CALLBACK
//!     /                → 404
//!                      → CallbackEmitter::send → 200 "OK"
//! ```
//!
//! # Design Decisions
//! - The acknowledgment never depends on the forward's outcome
//! - Raw bytes are captured before any parsing; a bad body is still forwarded
//! - No request/reply pairing with the persistent channel

pub mod body;
pub mod server;

pub use body::CapturedBody;
pub use server::CallbackReceiver;
