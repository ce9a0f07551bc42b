//! # Runtime event ring
//!
//! Bounded in-memory ring of structured events, mirrored to the `tracing`
//! file appender by the same call sites. Not part of the routing path —
//! consumed only by the HTTP control plane for observability.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub level: EventLevel,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Default ring capacity (spec.md §3: "fixed maximum, e.g. 1,000").
pub const DEFAULT_RING_CAPACITY: usize = 1000;

pub struct EventRing {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
}

impl EventRing {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    fn push(&self, level: EventLevel, kind: impl Into<String>, message: impl Into<String>, details: Option<serde_json::Value>) {
        let kind = kind.into();
        let message = message.into();
        match level {
            EventLevel::Info => tracing::info!(event = %kind, "{}", message),
            EventLevel::Warn => tracing::warn!(event = %kind, "{}", message),
            EventLevel::Error => tracing::error!(event = %kind, "{}", message),
        }
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(Event {
            ts: Utc::now(),
            level,
            kind,
            message,
            details,
        });
    }

    pub fn info(&self, kind: impl Into<String>, message: impl Into<String>) {
        self.push(EventLevel::Info, kind, message, None);
    }

    pub fn warn(&self, kind: impl Into<String>, message: impl Into<String>) {
        self.push(EventLevel::Warn, kind, message, None);
    }

    pub fn warn_with(&self, kind: impl Into<String>, message: impl Into<String>, details: serde_json::Value) {
        self.push(EventLevel::Warn, kind, message, Some(details));
    }

    pub fn error(&self, kind: impl Into<String>, message: impl Into<String>) {
        self.push(EventLevel::Error, kind, message, None);
    }

    /// Snapshot of the most recent `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Event> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }
}
