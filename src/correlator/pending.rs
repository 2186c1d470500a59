//! Per-connection table of requests awaiting their reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Bookkeeping for one in-flight request.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Local id used to tie log lines together.
    pub request_id: Uuid,
    pub method: String,
    pub since: Instant,
}

/// In-flight requests of one connection session, keyed by `ref`.
///
/// A fresh table is created for every connection, so two suppliers (or two
/// sessions of the same supplier) never share entries.
#[derive(Debug, Clone, Default)]
pub struct PendingReplies {
    inner: Arc<DashMap<String, PendingEntry>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `reference`. Returns `None` while another request with the same
    /// reference is still in flight.
    pub fn register(&self, reference: &str, method: &str) -> Option<PendingReply> {
        match self.inner.entry(reference.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let entry = PendingEntry {
                    request_id: Uuid::new_v4(),
                    method: method.to_string(),
                    since: Instant::now(),
                };
                let request_id = entry.request_id;
                slot.insert(entry);
                Some(PendingReply {
                    table: self.inner.clone(),
                    reference: reference.to_string(),
                    request_id,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.inner.contains_key(reference)
    }

    /// Age of the oldest in-flight request.
    pub fn oldest(&self) -> Option<Duration> {
        self.inner.iter().map(|e| e.since.elapsed()).max()
    }
}

/// Claim on a reference. Consumed by the reply; dropping it releases the
/// reference without replying.
#[derive(Debug)]
pub struct PendingReply {
    table: Arc<DashMap<String, PendingEntry>>,
    reference: String,
    request_id: Uuid,
}

impl PendingReply {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Run `reply` exactly once and release the reference.
    pub fn resolve<T, F>(self, reply: F) -> T
    where
        F: FnOnce(&str) -> T,
    {
        reply(&self.reference)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.table
            .remove_if(&self.reference, |_, entry| entry.request_id == self.request_id);
    }
}
