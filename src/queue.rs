//! # Queue store
//!
//! Per-recipient bounded FIFO of envelopes held while the recipient has no
//! live connection. Created lazily on first enqueue, drained fully on the
//! recipient's next successful auth, memory-only (spec.md §3/§9).

use crate::envelope::Envelope;
use crate::events::EventRing;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub struct QueueStore {
    limit: usize,
    queues: Mutex<HashMap<String, VecDeque<Envelope>>>,
    events: Arc<EventRing>,
}

impl QueueStore {
    pub fn new(limit: usize, events: Arc<EventRing>) -> Arc<Self> {
        Arc::new(Self {
            limit,
            queues: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// Append `envelope` to `recipient`'s queue. If this exceeds the queue
    /// limit, the oldest entry is dropped (FIFO, drop-oldest discipline);
    /// the drop is silent to producers, only a warn event is emitted.
    pub fn enqueue(&self, recipient: &str, envelope: Envelope) {
        let mut queues = self.queues.lock();
        let queue = queues.entry(recipient.to_string()).or_default();
        queue.push_back(envelope);
        if queue.len() > self.limit {
            queue.pop_front();
            self.events.warn_with(
                "queue_overflow",
                format!("dropped oldest queued envelope for {recipient}"),
                serde_json::json!({"recipient": recipient, "limit": self.limit}),
            );
        }
    }

    /// Remove and return all envelopes queued for `recipient`, in FIFO
    /// order, leaving an empty queue behind (not a missing entry — the
    /// next `depth` call will still report 0 correctly either way).
    pub fn drain(&self, recipient: &str) -> Vec<Envelope> {
        let mut queues = self.queues.lock();
        match queues.remove(recipient) {
            Some(queue) => queue.into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn depth(&self, recipient: &str) -> usize {
        self.queues
            .lock()
            .get(recipient)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Map of clientId -> queue depth, for status snapshots.
    pub fn depths(&self) -> HashMap<String, usize> {
        self.queues
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect()
    }
}
