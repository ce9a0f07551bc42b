//! # Wire protocol frames
//!
//! Newline-delimited JSON, UTF-8. One frame is one JSON object tagged by
//! `action`. The full catalog is in spec.md §6; this module is the typed
//! Rust mirror of that table, in the teacher's derive style
//! (`#[derive(Serialize, Deserialize)]` on a `#[serde(tag = "action")]`
//! enum rather than the teacher's length-prefixed binary `Message`, since
//! this wire format is explicitly NDJSON).

use crate::envelope::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-connection state machine: unauth -> authed. Modeled as a tagged
/// variant rather than a boolean flag so an authed connection always
/// carries its client id (spec.md §9 design note).
#[derive(Debug, Clone)]
pub enum ConnState {
    Unauth,
    Authed { client_id: String },
}

impl ConnState {
    pub fn client_id(&self) -> Option<&str> {
        match self {
            ConnState::Unauth => None,
            ConnState::Authed { client_id } => Some(client_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InboundFrame {
    #[serde(rename = "auth")]
    Auth { client_id: String, api_key: String },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "whoami")]
    Whoami,
    #[serde(rename = "send")]
    Send {
        #[serde(default)]
        to: String,
        #[serde(default = "default_send_type")]
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        payload: Value,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        #[serde(rename = "correlationId")]
        correlation_id: Option<String>,
    },
}

fn default_send_type() -> String {
    "message".to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundFrame {
    #[serde(rename = "auth_ok")]
    AuthOk {
        #[serde(rename = "clientId")]
        client_id: String,
        queued: usize,
        ts: chrono::DateTime<chrono::Utc>,
    },
    #[serde(rename = "auth_failed")]
    AuthFailed,
    #[serde(rename = "pong")]
    Pong { ts: chrono::DateTime<chrono::Utc> },
    #[serde(rename = "whoami")]
    Whoami {
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "canSendTo")]
        can_send_to: Vec<String>,
        ts: chrono::DateTime<chrono::Utc>,
    },
    #[serde(rename = "sent")]
    Sent {
        id: String,
        #[serde(rename = "deliveredTo")]
        delivered_to: usize,
        queued: bool,
        ts: chrono::DateTime<chrono::Utc>,
    },
    #[serde(rename = "message")]
    Message { envelope: Envelope },
    #[serde(rename = "error")]
    Error { error: &'static str },
}
