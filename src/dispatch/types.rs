//! Request and result types shared by the dispatcher, the correlator and the
//! callback emitter.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Outcome class of a local call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultStatus {
    Success,
    Process,
    Failed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Success => "SUCCESS",
            ResultStatus::Process => "PROCESS",
            ResultStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical result of a local API call.
///
/// Fields a structured local API adds beyond the canonical four are kept in
/// `extra` so the reply relays them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalResult {
    pub ok: bool,
    pub status: ResultStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default)]
    pub raw: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LocalResult {
    /// Accepted by the local software; final outcome arrives later.
    pub fn process(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            ok: true,
            status: ResultStatus::Process,
            raw: Some(Value::String(text.clone())),
            message: text,
            extra: Map::new(),
        }
    }

    /// The local call could not be completed.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: ResultStatus::Failed,
            message: message.into(),
            raw: None,
            extra: Map::new(),
        }
    }

    /// Normalize a response body that may or may not be JSON.
    ///
    /// - plain text (or a JSON string literal) → `PROCESS` carrying the text
    /// - a JSON object shaped as a result → passed through
    /// - any other JSON → `PROCESS` with the JSON kept in `raw`
    pub fn normalize(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::String(text)) => Self::process(text),
            Ok(value @ Value::Object(_)) => match serde_json::from_value::<LocalResult>(value.clone()) {
                Ok(result) => result,
                Err(_) => Self::unrecognized(body, value),
            },
            Ok(value) => Self::unrecognized(body, value),
            Err(_) => Self::process(body),
        }
    }

    fn unrecognized(body: &str, value: Value) -> Self {
        Self {
            ok: true,
            status: ResultStatus::Process,
            message: body.to_string(),
            raw: Some(value),
            extra: Map::new(),
        }
    }
}

/// A work request pushed by the central server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,

    /// Correlation id chosen by the server, unique per connection.
    #[serde(rename = "ref", default, deserialize_with = "scalar_as_string")]
    pub reference: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub payload: Map<String, Value>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, reference: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            reference: reference.into(),
            payload,
        }
    }

    /// Payload field rendered as text; `None` when absent or null.
    pub fn field_text(&self, key: &str) -> Option<String> {
        match self.payload.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Transaction id as the server sent it.
    pub fn trx_id(&self) -> Option<&Value> {
        self.payload.get("trxId").filter(|v| !v.is_null())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
