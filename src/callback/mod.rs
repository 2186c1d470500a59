//! Universal callback subsystem.
//!
//! # Data Flow
//! ```text
//! correlator (after reply)      ─┐
//!                                ├→ emitter.rs → POST central server
//! receiver (legacy callbacks)   ─┘      /api/callback/<code>
//!                                       /api/supplier-callback?code=<code>
//! ```
//!
//! # Design Decisions
//! - Single attempt, bounded timeout, no retry or queue
//! - `send` returns `()`: callers cannot observe delivery failure
//! - Routing by supplier code at call time, independent of any connection

pub mod emitter;
pub mod payload;

pub use emitter::{CallbackEmitter, CallbackError};
pub use payload::{CallbackPayload, CallbackSource, LegacyCallback};
