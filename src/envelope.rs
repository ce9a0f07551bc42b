//! # Envelope
//!
//! The unit of routing. An envelope's `from` is always the authenticated
//! identity of the connection that issued the `send` (or the `asClient` of
//! an operator HTTP send) — it is never taken from client-supplied input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub ts: DateTime<Utc>,
}

impl Envelope {
    /// Build a new envelope as the router/listener would at ingress: the
    /// caller supplies `from` (the authenticated sender) and the request
    /// fields; `id` is generated unless the client supplied one, and `ts`
    /// is always server-assigned.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
        id: Option<String>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            from: from.into(),
            to: to.into(),
            kind: kind.into(),
            payload,
            correlation_id,
            ts: Utc::now(),
        }
    }
}
