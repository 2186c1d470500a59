//! Supplier channel to the central server.
//!
//! # Data Flow
//! ```text
//! SupplierChannel::run
//!     ├─ CONNECTING   ws://<server>/socket.io/?EIO=4&transport=websocket[&supplierId=..]
//!     │                  ← 0{sid, pingInterval, pingTimeout}
//!     │                  → 40/supplier,[{"supplierId":..}]
//!     ├─ CONNECTED    ← 40/supplier,{sid}
//!     │                  ← 2 / → 3                      (heartbeat)
//!     │                  ← 42/supplier,["supplier:request",{..}] → correlator (own task)
//!     │                  → 42/supplier,["supplier:reply:<ref>",{..}]
//!     └─ DISCONNECTED → wait reconnect_delay → CONNECTING
//! ```
//!
//! # Design Decisions
//! - One socket writer task per session; request tasks only queue frames
//! - Each session gets a fresh pending table, so replies never leak across reconnects
//! - Fixed reconnect delay, unlimited attempts

pub mod client;
pub mod protocol;

use std::time::Duration;

use thiserror::Error;

pub use client::{ChannelEndpoint, ConnectionState, ReplyChannel, SupplierChannel};
pub use protocol::{EnginePacket, OpenHandshake, ProtocolError, SocketPacket, REQUEST_EVENT};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("connection refused by server: {0}")]
    Rejected(String),

    #[error("server closed the namespace")]
    ServerDisconnect,

    #[error("no heartbeat from server within {0:?}")]
    HeartbeatTimeout(Duration),

    #[error("not connected")]
    NotConnected,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
