//! Request/reply correlation.
//!
//! # Data Flow
//! ```text
//! supplier:request {method, ref, payload}
//!     → pending.rs (claim ref on this connection; duplicates refused)
//!     → dispatch (bounded by the reply deadline)
//!     → ReplySink::send_reply  → supplier:reply:<ref>   (exactly once)
//!     → CallbackEmitter::send  → central server          (after the reply)
//! ```
//!
//! # Design Decisions
//! - The pending claim is consumed by the reply, so a second reply cannot
//!   be written for the same claim
//! - Dispatcher failures and deadline expiry both turn into a FAILED reply
//! - A reply whose connection is gone is dropped; its callback still goes out

pub mod pending;

use std::time::Duration;

use crate::callback::{CallbackEmitter, CallbackPayload};
use crate::channel::ChannelError;
use crate::config::SupplierIdentity;
use crate::dispatch::{InboundRequest, LocalDispatcher, LocalResult, ResultStatus};
use crate::observability::metrics;

pub use pending::{PendingReplies, PendingReply};

/// Outbound half of a connection session.
pub trait ReplySink: Send + Sync {
    /// In-flight requests of this session.
    fn pending(&self) -> &PendingReplies;

    /// Emit `supplier:reply:<reference>` carrying `result`.
    fn send_reply(&self, reference: &str, result: &LocalResult) -> Result<(), ChannelError>;
}

/// What became of one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// A reply was written to the connection.
    Replied(ResultStatus),
    /// The connection was gone when the result was ready.
    Abandoned(ResultStatus),
    /// The request could not be correlated (no ref, or ref already in flight).
    Rejected,
}

/// Binds inbound requests of one supplier to their replies.
#[derive(Debug, Clone)]
pub struct Correlator {
    supplier: SupplierIdentity,
    dispatcher: LocalDispatcher,
    emitter: CallbackEmitter,
    reply_timeout: Duration,
}

impl Correlator {
    pub fn new(
        supplier: SupplierIdentity,
        dispatcher: LocalDispatcher,
        emitter: CallbackEmitter,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            supplier,
            dispatcher,
            emitter,
            reply_timeout,
        }
    }

    pub fn supplier(&self) -> &SupplierIdentity {
        &self.supplier
    }

    /// Process one request end to end on the session it arrived on.
    pub async fn handle<S: ReplySink>(&self, request: InboundRequest, sink: &S) -> HandleOutcome {
        let code = &self.supplier.code;

        if request.reference.is_empty() {
            tracing::warn!(supplier = %code, method = %request.method, "Dropping request without ref");
            return HandleOutcome::Rejected;
        }

        let Some(claim) = sink.pending().register(&request.reference, &request.method) else {
            tracing::warn!(
                supplier = %code,
                reference = %request.reference,
                "Request with this ref is already in flight; ignoring duplicate"
            );
            return HandleOutcome::Rejected;
        };
        metrics::set_pending(code, sink.pending().len());

        tracing::info!(
            supplier = %code,
            reference = %request.reference,
            request_id = %claim.request_id(),
            method = %request.method,
            "Request received"
        );

        let result = match tokio::time::timeout(
            self.reply_timeout,
            self.dispatcher.dispatch(&self.supplier, &request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    supplier = %code,
                    reference = %request.reference,
                    timeout_secs = self.reply_timeout.as_secs(),
                    "No local result before the reply deadline"
                );
                LocalResult::failed(format!(
                    "no local response within {}s",
                    self.reply_timeout.as_secs()
                ))
            }
        };

        let status = result.status;
        let sent = claim.resolve(|reference| sink.send_reply(reference, &result));
        metrics::set_pending(code, sink.pending().len());

        let outcome = match sent {
            Ok(()) => {
                tracing::info!(
                    supplier = %code,
                    reference = %request.reference,
                    status = %status,
                    "Reply sent"
                );
                metrics::record_reply(code, status.as_str());
                HandleOutcome::Replied(status)
            }
            Err(e) => {
                tracing::warn!(
                    supplier = %code,
                    reference = %request.reference,
                    error = %e,
                    "Reply abandoned"
                );
                metrics::record_abandoned(code);
                HandleOutcome::Abandoned(status)
            }
        };

        self.emitter
            .send(code, &CallbackPayload::from_result(&request, &result))
            .await;

        outcome
    }
}
