//! Notification bodies posted to the central server.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::dispatch::types::{InboundRequest, LocalResult, ResultStatus};

/// Where a notification originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackSource {
    /// Result of a request relayed over the persistent channel.
    LocalProcess,
    /// Legacy software encoded the callback in the URL path.
    SupplierPathCallback,
    /// Legacy software posted to `/callback`.
    WindowsCallback,
}

/// Outcome of a relayed request, sent after the reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub from: CallbackSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trx_id: Option<Value>,
    pub status: ResultStatus,
    pub message: String,
    pub supplier_result: Option<Value>,
}

impl CallbackPayload {
    pub fn from_result(request: &InboundRequest, result: &LocalResult) -> Self {
        Self {
            from: CallbackSource::LocalProcess,
            trx_id: request.trx_id().cloned(),
            status: result.status,
            message: result.message.clone(),
            supplier_result: result.raw.clone(),
        }
    }
}

/// A callback captured by the legacy receiver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyCallback {
    pub from: CallbackSource,
    pub method: String,
    pub raw: String,
    pub body: String,
    pub query: Map<String, Value>,
}
