//! # Router
//!
//! Given a validated envelope, deliver it: fan out to every live connection
//! of the recipient, or queue it if the recipient is offline. Never stalls
//! on one slow recipient connection (spec.md §5) — a full or closed
//! outbound channel just drops that one connection from the fanout.

use crate::connections::ConnectionManager;
use crate::envelope::Envelope;
use crate::events::EventRing;
use crate::protocol::OutboundFrame;
use crate::queue::QueueStore;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    pub delivered_to: usize,
    pub queued: bool,
}

#[derive(Clone)]
pub struct Router {
    connections: Arc<ConnectionManager>,
    queues: Arc<QueueStore>,
    events: Arc<EventRing>,
}

impl Router {
    pub fn new(connections: Arc<ConnectionManager>, queues: Arc<QueueStore>, events: Arc<EventRing>) -> Self {
        Self {
            connections,
            queues,
            events,
        }
    }

    /// Route `envelope` to `envelope.to`. Looks up live connections first;
    /// if none exist, enqueues. Write failures to individual recipient
    /// connections are logged but never abort the fanout or roll back
    /// deliveries already made to other connections.
    pub fn route(&self, envelope: Envelope) -> RouteOutcome {
        let recipient = envelope.to.clone();
        let handles = self.connections.connections_for(&recipient);

        if handles.is_empty() {
            self.queues.enqueue(&recipient, envelope);
            self.events.warn(
                "envelope_queued",
                format!("{recipient} offline, envelope queued"),
            );
            return RouteOutcome {
                delivered_to: 0,
                queued: true,
            };
        }

        let mut delivered = 0usize;
        for handle in &handles {
            let frame = OutboundFrame::Message {
                envelope: envelope.clone(),
            };
            match handle.try_send(frame) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    self.events.warn(
                        "delivery_write_failed",
                        format!("dropped delivery to one connection of {recipient}"),
                    );
                }
            }
        }

        self.events.info(
            "envelope_delivered",
            format!("delivered envelope to {delivered} connection(s) of {recipient}"),
        );

        RouteOutcome {
            delivered_to: delivered,
            queued: false,
        }
    }
}
