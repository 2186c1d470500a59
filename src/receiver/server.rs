//! HTTP surface for legacy callbacks.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::callback::{CallbackEmitter, CallbackSource, LegacyCallback};
use crate::config::{AckStyle, RelayConfig, Tenancy};
use crate::observability::metrics;
use crate::receiver::body::{form_map, CapturedBody};

/// State injected into handlers.
#[derive(Clone)]
struct ReceiverState {
    emitter: CallbackEmitter,
    tenancy: Tenancy,
    default_code: Arc<str>,
    codes: Arc<HashSet<String>>,
    ack: AckStyle,
    max_body_bytes: usize,
}

impl ReceiverState {
    /// Supplier a legacy callback belongs to.
    fn supplier_for<'a>(&'a self, query: &'a Map<String, Value>) -> &'a str {
        if self.tenancy == Tenancy::Multi {
            if let Some(Value::String(code)) = query.get("code") {
                if self.codes.contains(code) {
                    return code;
                }
            }
        }
        &self.default_code
    }

    async fn forward(&self, callback: LegacyCallback) -> Response {
        let code = self.supplier_for(&callback.query).to_string();
        tracing::info!(
            supplier = %code,
            from = ?callback.from,
            method = %callback.method,
            raw = %callback.raw,
            "Legacy callback received"
        );
        self.emitter.send(&code, &callback).await;
        self.acknowledge()
    }

    fn acknowledge(&self) -> Response {
        match self.ack {
            AckStyle::Text => ([(header::CONTENT_TYPE, "text/plain")], "OK").into_response(),
            AckStyle::Json => Json(json!({ "ok": true })).into_response(),
        }
    }
}

/// Receives callbacks from legacy local software and forwards them to the
/// central server.
pub struct CallbackReceiver {
    router: Router,
}

impl CallbackReceiver {
    pub fn new(config: &RelayConfig, emitter: CallbackEmitter) -> Self {
        let state = ReceiverState {
            emitter,
            tenancy: config.tenancy,
            default_code: Arc::from(config.default_supplier_code().unwrap_or_default()),
            codes: Arc::new(config.suppliers.iter().map(|s| s.code.clone()).collect()),
            ack: config.receiver.ack,
            max_body_bytes: config.receiver.max_body_bytes,
        };

        let router = Router::new()
            .route("/callback", any(body_callback))
            .route("/{*path}", any(path_callback))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Callback receiver listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Callback receiver stopped");
        Ok(())
    }
}

fn query_map(uri: &Uri) -> Map<String, Value> {
    uri.query().map(|q| form_map(q.as_bytes())).unwrap_or_default()
}

/// `/<anything>`: the path itself is the callback.
async fn path_callback(
    State(state): State<ReceiverState>,
    method: Method,
    uri: Uri,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let decoded = match path {
        Ok(Path(path)) => path,
        Err(_) => uri.path().to_string(),
    };
    let raw = decoded.strip_prefix('/').unwrap_or(&decoded).trim().to_string();
    if raw.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    metrics::record_legacy_callback("path");

    state
        .forward(LegacyCallback {
            from: CallbackSource::SupplierPathCallback,
            method: method.to_string(),
            body: raw.clone(),
            raw,
            query: query_map(&uri),
        })
        .await
}

/// `/callback`: the body is the callback.
async fn body_callback(
    State(state): State<ReceiverState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    metrics::record_legacy_callback("body");
    let captured = CapturedBody::capture(&headers, body, state.max_body_bytes).await;
    let text = captured.text();

    state
        .forward(LegacyCallback {
            from: CallbackSource::WindowsCallback,
            method: method.to_string(),
            body: text.clone(),
            raw: text,
            query: query_map(&uri),
        })
        .await
}
