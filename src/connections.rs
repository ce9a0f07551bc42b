//! # Connection manager
//!
//! Tracks live authenticated connections grouped by client id. A single
//! client id may hold multiple concurrent connections; the manager holds
//! weak handles (an outbound-frame sender) back to them — the stream task
//! itself owns the connection's lifetime, per spec.md §3 "Ownership".
//!
//! Grounded on the teacher's `ipc::unix_domain_socket::UnixDomainSocketTransport`
//! connection table (`Arc<Mutex<HashMap<ConnectionId, UnixStream>>>`),
//! generalized here to client-id-keyed sets of lightweight connection
//! handles rather than raw stream ownership.

use crate::protocol::OutboundFrame;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type ConnId = u64;

/// A lightweight, cloneable handle the connection manager and router use to
/// deliver frames to one live connection without touching the socket
/// directly. Delivery goes through a bounded channel so a slow recipient
/// cannot stall the router (spec.md §5).
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: ConnId,
    sender: mpsc::Sender<OutboundFrame>,
}

impl ConnectionHandle {
    /// Enqueue a frame for delivery on this connection's write task.
    /// Returns `Err` if the connection's outbound channel is full or
    /// closed — the caller (router) treats this as a per-recipient
    /// delivery failure and moves on, never blocking other deliveries.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<(), mpsc::error::TrySendError<OutboundFrame>> {
        self.sender.try_send(frame)
    }

    /// Deliver a reply on this connection's own write task, waiting for
    /// channel capacity. Used for direct replies to a connection's own
    /// requests (auth_ok, pong, sent, ...), as opposed to router fanout
    /// which must never block and uses `try_send` instead.
    pub async fn send(&self, frame: OutboundFrame) -> Result<(), mpsc::error::SendError<OutboundFrame>> {
        self.sender.send(frame).await
    }
}

fn next_conn_id() -> ConnId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

pub struct ConnectionManager {
    by_client: Mutex<HashMap<String, Vec<ConnectionHandle>>>,
}

impl ConnectionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            by_client: Mutex::new(HashMap::new()),
        })
    }

    /// Allocate a new connection id and an outbound channel, returning the
    /// handle (stored by the manager) and the receiving half (owned by the
    /// connection's write task). Not registered under any client id until
    /// [`ConnectionManager::register`] is called on successful auth.
    pub fn new_handle(&self, capacity: usize) -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            ConnectionHandle {
                id: next_conn_id(),
                sender: tx,
            },
            rx,
        )
    }

    pub fn register(&self, client_id: &str, handle: ConnectionHandle) {
        self.by_client
            .lock()
            .entry(client_id.to_string())
            .or_default()
            .push(handle);
    }

    pub fn unregister(&self, client_id: &str, conn_id: ConnId) {
        let mut map = self.by_client.lock();
        if let Some(handles) = map.get_mut(client_id) {
            handles.retain(|h| h.id != conn_id);
            if handles.is_empty() {
                map.remove(client_id);
            }
        }
    }

    /// Snapshot of live connection handles for `client_id`, for delivery.
    pub fn connections_for(&self, client_id: &str) -> Vec<ConnectionHandle> {
        self.by_client
            .lock()
            .get(client_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Map of clientId -> live connection count, for status snapshots.
    pub fn counts(&self) -> HashMap<String, usize> {
        self.by_client
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect()
    }
}
