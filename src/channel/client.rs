//! Persistent channel to the central server, one per supplier identity.
//!
//! # Responsibilities
//! - Open the Socket.IO session and present the supplier id
//! - Answer Engine.IO heartbeats
//! - Hand every `supplier:request` to the correlator on its own task
//! - Reconnect after a fixed delay, forever, until shutdown

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use url::Url;

use crate::channel::protocol::{reply_event, EnginePacket, SocketPacket, REQUEST_EVENT};
use crate::channel::ChannelError;
use crate::config::{CredentialPlacement, SupplierIdentity};
use crate::correlator::{Correlator, PendingReplies, ReplySink};
use crate::dispatch::{InboundRequest, LocalResult};
use crate::observability::metrics;

/// Heartbeat window used until the server announces its own.
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(45);

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Where and how to connect for one supplier.
#[derive(Debug, Clone)]
pub struct ChannelEndpoint {
    url: Url,
    namespace: String,
    auth: Option<Value>,
}

impl ChannelEndpoint {
    pub fn new(
        server_url: &str,
        path: &str,
        namespace: &str,
        supplier: &SupplierIdentity,
        placement: CredentialPlacement,
    ) -> Result<Self, ChannelError> {
        let mut url = Url::parse(server_url)
            .map_err(|e| ChannelError::InvalidUrl(format!("{}: {}", server_url, e)))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ChannelError::InvalidUrl(format!("unsupported scheme {:?}", other))),
        };
        url.set_scheme(scheme)
            .map_err(|_| ChannelError::InvalidUrl(server_url.to_string()))?;
        url.set_path(path);
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");

        let auth = match placement {
            CredentialPlacement::Query => {
                url.query_pairs_mut().append_pair("supplierId", &supplier.id);
                None
            }
            CredentialPlacement::Auth => Some(json!({ "supplierId": supplier.id })),
        };

        Ok(Self {
            url,
            namespace: namespace.to_string(),
            auth,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn connect_packet(&self) -> SocketPacket {
        SocketPacket::Connect {
            namespace: self.namespace.clone(),
            data: self.auth.clone(),
        }
    }
}

/// Outbound half of one connection session.
#[derive(Debug, Clone)]
pub struct ReplyChannel {
    namespace: String,
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingReplies,
}

impl ReplyChannel {
    fn send_frame(&self, frame: String) -> Result<(), ChannelError> {
        self.outbound
            .send(Message::Text(frame.into()))
            .map_err(|_| ChannelError::NotConnected)
    }
}

impl ReplySink for ReplyChannel {
    fn pending(&self) -> &PendingReplies {
        &self.pending
    }

    fn send_reply(&self, reference: &str, result: &LocalResult) -> Result<(), ChannelError> {
        let packet = SocketPacket::event(
            &self.namespace,
            reply_event(reference),
            vec![serde_json::to_value(result)?],
        );
        self.send_frame(packet.to_frame())
    }
}

/// Aborts the socket writer when the session ends, however it ends.
struct WriterTask(JoinHandle<()>);

impl Drop for WriterTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Long-lived connection for one supplier identity.
pub struct SupplierChannel {
    endpoint: ChannelEndpoint,
    reconnect_delay: Duration,
    correlator: Arc<Correlator>,
    state: watch::Sender<ConnectionState>,
}

impl SupplierChannel {
    pub fn new(endpoint: ChannelEndpoint, reconnect_delay: Duration, correlator: Correlator) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            endpoint,
            reconnect_delay,
            correlator: Arc::new(correlator),
            state,
        }
    }

    pub fn supplier(&self) -> &SupplierIdentity {
        self.correlator.supplier()
    }

    pub fn endpoint(&self) -> &ChannelEndpoint {
        &self.endpoint
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
        metrics::set_channel_state(&self.supplier().code, state);
    }

    /// Connect and keep reconnecting until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let code = self.supplier().code.clone();
        tracing::info!(
            supplier = %code,
            url = %self.endpoint.url,
            namespace = %self.endpoint.namespace,
            "Supplier channel starting"
        );

        loop {
            self.set_state(ConnectionState::Connecting);
            tokio::select! {
                result = self.session() => match result {
                    Ok(()) => tracing::warn!(supplier = %code, "Disconnected from central server"),
                    Err(e) => tracing::warn!(supplier = %code, error = %e, "Channel error"),
                },
                _ = shutdown.recv() => break,
            }

            self.set_state(ConnectionState::Disconnected);
            tracing::info!(
                supplier = %code,
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Reconnecting"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.recv() => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!(supplier = %code, "Supplier channel stopped");
    }

    /// One connection, from handshake until the socket closes.
    async fn session(&self) -> Result<(), ChannelError> {
        let (ws, _) = connect_async(self.endpoint.url.as_str()).await?;
        let (mut write, mut read) = ws.split();

        let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();
        let _writer = WriterTask(tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                if write.send(message).await.is_err() {
                    break;
                }
            }
        }));

        let replies = ReplyChannel {
            namespace: self.endpoint.namespace.clone(),
            outbound,
            pending: PendingReplies::new(),
        };

        let result = self.read_loop(&mut read, &replies).await;

        if !replies.pending.is_empty() {
            tracing::warn!(
                supplier = %self.supplier().code,
                in_flight = replies.pending.len(),
                "Connection lost with requests in flight; their replies will be dropped"
            );
        }
        result
    }

    async fn read_loop<R>(&self, read: &mut R, replies: &ReplyChannel) -> Result<(), ChannelError>
    where
        R: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        let mut heartbeat = DEFAULT_HEARTBEAT;

        loop {
            let frame = match tokio::time::timeout(heartbeat, read.next()).await {
                Err(_) => return Err(ChannelError::HeartbeatTimeout(heartbeat)),
                Ok(None) => return Ok(()),
                Ok(Some(frame)) => frame?,
            };

            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(()),
                _ => continue,
            };

            let packet = match EnginePacket::decode(text.as_str()) {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring undecodable frame");
                    continue;
                }
            };

            match packet {
                EnginePacket::Open(handshake) => {
                    if handshake.ping_interval > 0 {
                        heartbeat = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
                    }
                    tracing::debug!(sid = %handshake.sid, "Engine.IO session open");
                    replies.send_frame(self.endpoint.connect_packet().to_frame())?;
                }
                EnginePacket::Ping(data) => replies.send_frame(EnginePacket::Pong(data).encode())?,
                EnginePacket::Close => return Ok(()),
                EnginePacket::Message(payload) => self.on_packet(&payload, replies)?,
                _ => {}
            }
        }
    }

    fn on_packet(&self, payload: &str, replies: &ReplyChannel) -> Result<(), ChannelError> {
        let packet = match SocketPacket::decode(payload) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring undecodable packet");
                return Ok(());
            }
        };
        if packet.namespace() != self.endpoint.namespace {
            tracing::debug!(namespace = %packet.namespace(), "Ignoring packet for another namespace");
            return Ok(());
        }

        match packet {
            SocketPacket::Connect { .. } => {
                self.set_state(ConnectionState::Connected);
                tracing::info!(supplier = %self.supplier().code, "Connected to central server");
            }
            SocketPacket::ConnectError { data, .. } => {
                let reason = data.map(|d| d.to_string()).unwrap_or_default();
                return Err(ChannelError::Rejected(reason));
            }
            SocketPacket::Disconnect { .. } => return Err(ChannelError::ServerDisconnect),
            SocketPacket::Event { name, args, .. } if name == REQUEST_EVENT => {
                self.accept_request(args, replies);
            }
            SocketPacket::Event { name, .. } => {
                tracing::debug!(event = %name, "Ignoring event");
            }
            SocketPacket::Ack { .. } => {}
        }
        Ok(())
    }

    fn accept_request(&self, args: Vec<Value>, replies: &ReplyChannel) {
        let code = &self.supplier().code;
        let request = match args.into_iter().next().map(serde_json::from_value::<InboundRequest>) {
            Some(Ok(request)) => request,
            Some(Err(e)) => {
                tracing::warn!(supplier = %code, error = %e, "Malformed supplier:request");
                return;
            }
            None => {
                tracing::warn!(supplier = %code, "supplier:request without data");
                return;
            }
        };
        metrics::record_request(code);

        let correlator = self.correlator.clone();
        let replies = replies.clone();
        tokio::spawn(async move {
            correlator.handle(request, &replies).await;
        });
    }
}
