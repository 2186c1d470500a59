//! Raw-first body capture for legacy callbacks.

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap};
use serde_json::{Map, Value};

/// Body of a legacy callback: the raw bytes, plus whatever structure could
/// be read from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedBody {
    pub raw: Bytes,
    pub structured: Option<Value>,
}

impl CapturedBody {
    /// Read the whole body, up to `limit` bytes. Never fails: an oversized or
    /// broken body is logged and captured as empty.
    pub async fn capture(headers: &HeaderMap, body: Body, limit: usize) -> Self {
        let raw = match to_bytes(body, limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, limit, "Callback body not captured");
                Bytes::new()
            }
        };
        Self::from_bytes(headers, raw)
    }

    pub fn from_bytes(headers: &HeaderMap, raw: Bytes) -> Self {
        let structured = parse_structured(headers, &raw);
        Self { raw, structured }
    }

    /// Text forwarded to the central server.
    ///
    /// A body that parsed to a plain string wins, then the raw bytes, then the
    /// structured body rendered as JSON (`{}` when there is nothing at all).
    pub fn text(&self) -> String {
        if let Some(Value::String(text)) = &self.structured {
            return text.clone();
        }
        if !self.raw.is_empty() {
            return String::from_utf8_lossy(&self.raw).into_owned();
        }
        match &self.structured {
            Some(value) => value.to_string(),
            None => "{}".to_string(),
        }
    }
}

fn parse_structured(headers: &HeaderMap, raw: &[u8]) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") || content_type.contains("+json") {
        match serde_json::from_slice(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "Callback body is not valid JSON");
                None
            }
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Some(Value::Object(form_map(raw)))
    } else {
        Some(Value::String(String::from_utf8_lossy(raw).into_owned()))
    }
}

/// Decode `a=1&b=2&a=3` into a map; repeated keys collect into an array.
pub fn form_map(input: &[u8]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            None => {
                map.insert(key.into_owned(), value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    map
}
