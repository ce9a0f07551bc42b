//! Shared application state handed to both the stream listener and the
//! HTTP control plane — one `Arc<BridgeState>` per process.

use crate::config::Config;
use crate::connections::ConnectionManager;
use crate::events::EventRing;
use crate::queue::QueueStore;
use crate::router::Router;
use std::sync::Arc;

pub struct BridgeState {
    pub config: Arc<Config>,
    pub connections: Arc<ConnectionManager>,
    pub queues: Arc<QueueStore>,
    pub events: Arc<EventRing>,
    pub router: Router,
}

impl BridgeState {
    pub fn new(config: Arc<Config>) -> Arc<Self> {
        let events = EventRing::new(crate::events::DEFAULT_RING_CAPACITY);
        let connections = ConnectionManager::new();
        let queues = QueueStore::new(config.queue_limit, events.clone());
        let router = Router::new(connections.clone(), queues.clone(), events.clone());
        Arc::new(Self {
            config,
            connections,
            queues,
            events,
            router,
        })
    }
}
