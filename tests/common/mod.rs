//! Shared utilities for integration testing: a mock central server, mock
//! local APIs and a relay launcher.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::Response,
    routing::{any, get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use supplier_relay::config::{RelayConfig, SupplierIdentity, Tenancy};
use supplier_relay::{Relay, Shutdown};

/// How long a test waits for something that should happen.
pub const WAIT: Duration = Duration::from_secs(10);

pub fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

// ---------------------------------------------------------------------------
// Mock central server
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct CentralState {
    sessions: mpsc::UnboundedSender<Session>,
    callbacks: mpsc::UnboundedSender<(String, Value)>,
    callback_status: Arc<AtomicU16>,
}

/// Socket.IO endpoint plus both callback routes, like the real central server.
pub struct MockCentral {
    pub addr: SocketAddr,
    sessions: mpsc::UnboundedReceiver<Session>,
    callbacks: mpsc::UnboundedReceiver<(String, Value)>,
    callback_status: Arc<AtomicU16>,
}

/// One supplier connection as seen by the central server.
pub struct Session {
    /// `supplierId` presented at connect time.
    pub supplier_id: String,
    /// `"query"` or `"auth"`.
    pub credential: &'static str,
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl MockCentral {
    pub async fn start(addr: SocketAddr) -> Self {
        let (sessions_tx, sessions) = mpsc::unbounded_channel();
        let (callbacks_tx, callbacks) = mpsc::unbounded_channel();
        let callback_status = Arc::new(AtomicU16::new(200));

        let state = CentralState {
            sessions: sessions_tx,
            callbacks: callbacks_tx,
            callback_status: callback_status.clone(),
        };
        let app = Router::new()
            .route("/socket.io/", get(socket_io))
            .route("/api/callback/{code}", post(path_route_callback))
            .route("/api/supplier-callback", post(query_route_callback))
            .with_state(state);

        let listener = TcpListener::bind(addr).await.unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            sessions,
            callbacks,
            callback_status,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Status code answered to every callback from now on.
    pub fn set_callback_status(&self, status: u16) {
        self.callback_status.store(status, Ordering::SeqCst);
    }

    /// Next supplier that completed the namespace handshake.
    pub async fn next_session(&mut self) -> Session {
        tokio::time::timeout(WAIT, self.sessions.recv())
            .await
            .expect("no supplier connected")
            .expect("central server stopped")
    }

    /// Next callback received, as `(supplier code, body)`.
    pub async fn next_callback(&mut self) -> (String, Value) {
        tokio::time::timeout(WAIT, self.callbacks.recv())
            .await
            .expect("no callback received")
            .expect("central server stopped")
    }

    pub async fn try_next_callback(&mut self, wait: Duration) -> Option<(String, Value)> {
        tokio::time::timeout(wait, self.callbacks.recv()).await.ok().flatten()
    }
}

impl Session {
    /// Push a `supplier:request`.
    pub fn request(&self, method: &str, reference: &str, payload: Value) {
        let data = json!(["supplier:request", { "method": method, "ref": reference, "payload": payload }]);
        self.send_frame(format!("42/supplier,{}", data));
    }

    pub fn send_frame(&self, frame: String) {
        let _ = self.outbound.send(frame);
    }

    /// Engine.IO ping.
    pub fn ping(&self) {
        self.send_frame("2".to_string());
    }

    /// Next raw frame from the supplier.
    pub async fn next_frame(&mut self) -> String {
        tokio::time::timeout(WAIT, self.inbound.recv())
            .await
            .expect("no frame from supplier")
            .expect("supplier disconnected")
    }

    /// Next `supplier:reply:<ref>`, as `(ref, result)`.
    pub async fn next_reply(&mut self) -> (String, Value) {
        self.try_next_reply(WAIT).await.expect("no reply from supplier")
    }

    pub async fn try_next_reply(&mut self, wait: Duration) -> Option<(String, Value)> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.inbound.recv()).await.ok()??;
            let Some(data) = frame.strip_prefix("42/supplier,") else {
                continue;
            };
            let args: Vec<Value> = serde_json::from_str(data).ok()?;
            let reference = args.first()?.as_str()?.strip_prefix("supplier:reply:")?.to_string();
            return Some((reference, args.get(1).cloned().unwrap_or(Value::Null)));
        }
    }

    /// Close the connection from the server side.
    pub fn disconnect(self) {}
}

async fn socket_io(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<CentralState>,
) -> Response {
    ws.on_upgrade(move |socket| run_socket(socket, query, state))
}

async fn run_socket(socket: WebSocket, query: HashMap<String, String>, state: CentralState) {
    let (mut sink, mut stream) = socket.split();

    let open = r#"0{"sid":"mock-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    if sink.send(Message::Text(open.into())).await.is_err() {
        return;
    }

    let auth = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(auth) = text.as_str().strip_prefix("40/supplier,") {
                    break auth.to_string();
                }
            }
            Some(Ok(_)) => continue,
            _ => return,
        }
    };

    let (supplier_id, credential) = match query.get("supplierId") {
        Some(id) => (id.clone(), "query"),
        None => {
            let id = serde_json::from_str::<Value>(&auth)
                .ok()
                .and_then(|v| v["supplierId"].as_str().map(String::from))
                .unwrap_or_default();
            (id, "auth")
        }
    };

    if sink
        .send(Message::Text(r#"40/supplier,{"sid":"ns-sid"}"#.into()))
        .await
        .is_err()
    {
        return;
    }

    let (outbound, mut frames_out) = mpsc::unbounded_channel::<String>();
    let (frames_in, inbound) = mpsc::unbounded_channel::<String>();
    let _ = state.sessions.send(Session {
        supplier_id,
        credential,
        outbound,
        inbound,
    });

    loop {
        tokio::select! {
            frame = frames_out.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = frames_in.send(text.as_str().to_string());
                }
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

async fn path_route_callback(
    State(state): State<CentralState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let _ = state.callbacks.send((code, body));
    callback_status(&state)
}

async fn query_route_callback(
    State(state): State<CentralState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> StatusCode {
    let code = query.get("code").cloned().unwrap_or_default();
    let _ = state.callbacks.send((code, body));
    callback_status(&state)
}

fn callback_status(state: &CentralState) -> StatusCode {
    StatusCode::from_u16(state.callback_status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Mock local APIs
// ---------------------------------------------------------------------------

/// Structured local API: `POST /process`, answered by `f(envelope)`.
/// Every envelope is also forwarded to the returned receiver.
pub async fn start_structured_local<F, Fut>(addr: SocketAddr, f: F) -> mpsc::UnboundedReceiver<Value>
where
    F: Fn(Value) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let (seen_tx, seen) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/process",
        post(move |Json(envelope): Json<Value>| {
            let f = f.clone();
            let seen_tx = seen_tx.clone();
            async move {
                let _ = seen_tx.send(envelope.clone());
                let (status, body) = f(envelope).await;
                (StatusCode::from_u16(status).unwrap(), body)
            }
        }),
    );
    serve(addr, app).await;
    seen
}

/// Legacy local API: `GET /<kode>.<tujuan>.<trxId>`, answered with plain text.
/// Every requested order path is forwarded to the returned receiver.
pub async fn start_legacy_local(addr: SocketAddr, reply: &'static str) -> mpsc::UnboundedReceiver<String> {
    let (seen_tx, seen) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/{*order}",
        any(move |Path(order): Path<String>| {
            let seen_tx = seen_tx.clone();
            async move {
                let _ = seen_tx.send(order);
                reply
            }
        }),
    );
    serve(addr, app).await;
    seen
}

async fn serve(addr: SocketAddr, app: Router) {
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

pub fn relay_config(
    central: SocketAddr,
    local: SocketAddr,
    receiver: SocketAddr,
    tenancy: Tenancy,
    suppliers: &[(&str, &str)],
) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.server_url = format!("http://{}", central);
    config.tenancy = tenancy;
    config.suppliers = suppliers
        .iter()
        .map(|(id, code)| SupplierIdentity::new(*id, *code))
        .collect();
    config.local_api.base_url = format!("http://{}", local);
    config.receiver.bind_address = receiver.to_string();
    config.channel.reconnect_delay_ms = 100;
    config.timeouts.local_api_secs = 5;
    config.timeouts.callback_secs = 5;
    config.timeouts.reply_secs = 8;
    config
}

/// Start the relay in the background. Triggering the returned handle stops it.
pub async fn start_relay(config: RelayConfig) -> Shutdown {
    let relay = Relay::new(&config).unwrap();
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    tokio::spawn(async move {
        let _ = relay.run(&handle).await;
    });
    // Let the receiver bind before the test talks to it.
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
