//! # Stream listener and protocol state machine
//!
//! Accepts connections on the local Unix domain socket, runs the
//! per-connection `unauth -> authed` protocol state machine, parses
//! newline-delimited JSON frames, and dispatches to the [`crate::router`].
//!
//! Grounded on the teacher's `ipc::unix_domain_socket` accept/serve loop
//! shape (listener bind, per-connection task, read/write split); framing
//! itself is NDJSON rather than the teacher's 4-byte length prefix, per
//! spec.md §4.5/§6.

use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::protocol::{ConnState, InboundFrame, OutboundFrame};
use crate::state::BridgeState;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// Capacity of a connection's outbound-frame channel. Bounds how many
/// frames (replies + fanned-out deliveries) can be in flight to one
/// connection before the router starts dropping deliveries to it.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// Remove a stale socket file (best-effort), bind the listener, and apply
/// the configured file mode — the lifecycle supervisor's startup sequence
/// for this component (spec.md §4.5, §4.7).
pub fn bind(state: &BridgeState) -> anyhow::Result<UnixListener> {
    let path = &state.config.socket_path;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            state.events.warn(
                "stale_socket_cleanup_failed",
                format!("could not remove stale socket at {}: {e}", path.display()),
            );
        }
    }
    let listener = UnixListener::bind(path)?;
    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(state.config.socket_mode))?;
    }
    Ok(listener)
}

/// Run the accept loop until `shutdown` fires. Each accepted connection is
/// served on its own task so slow readers never block new accepts or each
/// other.
pub async fn serve(listener: UnixListener, state: Arc<BridgeState>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, state).await;
                        });
                    }
                    Err(e) => {
                        state.events.warn("accept_failed", format!("accept error: {e}"));
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, state: Arc<BridgeState>) {
    let (mut read_half, mut write_half) = tokio::io::split(stream);
    let (handle, mut outbound_rx) = state.connections.new_handle(OUTBOUND_CHANNEL_CAPACITY);
    let connect_time = std::time::Instant::now();

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let Ok(mut line) = serde_json::to_vec(&frame) else {
                continue;
            };
            line.push(b'\n');
            if write_half.write_all(&line).await.is_err() {
                break;
            }
        }
    });

    let mut conn_state = ConnState::Unauth;
    let mut acc: Vec<u8> = Vec::new();
    let mut read_buf = vec![0u8; 8192];
    let max_frame = state.config.max_frame_bytes;

    'outer: loop {
        let n = match read_half.read(&mut read_buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                state.events.warn("connection_read_error", format!("{e}"));
                break;
            }
        };
        acc.extend_from_slice(&read_buf[..n]);

        if acc.len() > max_frame * 2 {
            let _ = handle
                .send(OutboundFrame::Error {
                    error: ProtocolError::BufferExceeded.code(),
                })
                .await;
            break;
        }

        while let Some(pos) = acc.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = acc.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }

            if line.len() > max_frame {
                let _ = handle
                    .send(OutboundFrame::Error {
                        error: ProtocolError::MessageTooLarge.code(),
                    })
                    .await;
                continue;
            }

            if !dispatch_line(line, &mut conn_state, &handle, &state).await {
                break 'outer;
            }
        }
    }

    if let ConnState::Authed { client_id } = &conn_state {
        state.connections.unregister(client_id, handle.id);
        state.events.info(
            "connection_closed",
            format!(
                "{client_id} disconnected after {:.3}s",
                connect_time.elapsed().as_secs_f64()
            ),
        );
    }

    drop(handle);
    let _ = writer_task.await;
}

/// Parse and dispatch one frame. Returns `false` when the connection must
/// be destroyed (auth failure).
async fn dispatch_line(
    line: &[u8],
    conn_state: &mut ConnState,
    handle: &crate::connections::ConnectionHandle,
    state: &Arc<BridgeState>,
) -> bool {
    let value: Value = match serde_json::from_slice(line) {
        Ok(v) => v,
        Err(_) => {
            let _ = handle
                .send(OutboundFrame::Error {
                    error: ProtocolError::InvalidJson.code(),
                })
                .await;
            return true;
        }
    };

    if value.get("action").and_then(Value::as_str).is_none() {
        let _ = handle
            .send(OutboundFrame::Error {
                error: ProtocolError::InvalidJson.code(),
            })
            .await;
        return true;
    }

    match conn_state {
        ConnState::Unauth => dispatch_unauth(&value, conn_state, handle, state).await,
        ConnState::Authed { client_id } => {
            let client_id = client_id.clone();
            dispatch_authed(&value, &client_id, handle, state).await
        }
    }
}

/// Deserialize `value` into the typed frame catalog, reporting parse
/// failures as `invalid_json` to the caller.
async fn parse_frame(
    value: &Value,
    handle: &crate::connections::ConnectionHandle,
) -> Option<InboundFrame> {
    match serde_json::from_value(value.clone()) {
        Ok(frame) => Some(frame),
        Err(_) => {
            let _ = handle
                .send(OutboundFrame::Error {
                    error: ProtocolError::InvalidJson.code(),
                })
                .await;
            None
        }
    }
}

async fn dispatch_unauth(
    value: &Value,
    conn_state: &mut ConnState,
    handle: &crate::connections::ConnectionHandle,
    state: &Arc<BridgeState>,
) -> bool {
    if value.get("action").and_then(Value::as_str) != Some("auth") {
        let _ = handle
            .send(OutboundFrame::Error {
                error: ProtocolError::AuthRequired.code(),
            })
            .await;
        return true;
    }

    let Some(frame) = parse_frame(value, handle).await else {
        return true;
    };
    let InboundFrame::Auth { client_id, api_key } = frame else {
        let _ = handle
            .send(OutboundFrame::Error {
                error: ProtocolError::InvalidJson.code(),
            })
            .await;
        return true;
    };

    let expected_hash = state.config.registry.get(&client_id).map(|c| c.key_hash.clone());
    let presented_hash = crate::util::hash_secret(&api_key);
    let authenticated = match expected_hash {
        Some(expected) => crate::util::constant_time_eq(&expected, &presented_hash),
        None => false,
    };

    if !authenticated {
        let _ = handle.send(OutboundFrame::AuthFailed).await;
        state.events.warn("auth_failed", format!("auth failed for {client_id}"));
        return false;
    }

    *conn_state = ConnState::Authed {
        client_id: client_id.clone(),
    };
    state.connections.register(&client_id, handle.clone());

    let depth_before_drain = state.queues.depth(&client_id);
    let _ = handle
        .send(OutboundFrame::AuthOk {
            client_id: client_id.clone(),
            queued: depth_before_drain,
            ts: chrono::Utc::now(),
        })
        .await;

    for envelope in state.queues.drain(&client_id) {
        let _ = handle.send(OutboundFrame::Message { envelope }).await;
    }

    state.events.info("client_authenticated", format!("{client_id} authenticated"));
    true
}

async fn dispatch_authed(
    value: &Value,
    client_id: &str,
    handle: &crate::connections::ConnectionHandle,
    state: &Arc<BridgeState>,
) -> bool {
    let action = value.get("action").and_then(Value::as_str);
    if !matches!(action, Some("ping") | Some("whoami") | Some("send")) {
        let _ = handle
            .send(OutboundFrame::Error {
                error: ProtocolError::UnknownAction.code(),
            })
            .await;
        return true;
    }

    let Some(frame) = parse_frame(value, handle).await else {
        return true;
    };

    match frame {
        InboundFrame::Ping => {
            let _ = handle.send(OutboundFrame::Pong { ts: chrono::Utc::now() }).await;
        }
        InboundFrame::Whoami => {
            let can_send_to = state
                .config
                .registry
                .get(client_id)
                .map(|c| c.can_send_to.iter().cloned().collect())
                .unwrap_or_default();
            let _ = handle
                .send(OutboundFrame::Whoami {
                    client_id: client_id.to_string(),
                    can_send_to,
                    ts: chrono::Utc::now(),
                })
                .await;
        }
        InboundFrame::Send {
            to,
            kind,
            payload,
            id,
            correlation_id,
        } => {
            handle_send(to, kind, payload, id, correlation_id, client_id, handle, state).await;
        }
        // `action` is restricted to ping/whoami/send above; auth cannot parse here.
        InboundFrame::Auth { .. } => {
            let _ = handle
                .send(OutboundFrame::Error {
                    error: ProtocolError::UnknownAction.code(),
                })
                .await;
        }
    }
    true
}

async fn handle_send(
    to: String,
    kind: String,
    payload: Value,
    id: Option<String>,
    correlation_id: Option<String>,
    from: &str,
    handle: &crate::connections::ConnectionHandle,
    state: &Arc<BridgeState>,
) {
    if to.is_empty() {
        let _ = handle
            .send(OutboundFrame::Error {
                error: ProtocolError::MissingTo.code(),
            })
            .await;
        return;
    }

    if !state.config.registry.contains(&to) {
        let _ = handle
            .send(OutboundFrame::Error {
                error: ProtocolError::UnknownTarget.code(),
            })
            .await;
        return;
    }

    let sender = state.config.registry.get(from).expect("authed client must be registered");
    if !sender.can_route_to(&to) {
        let _ = handle
            .send(OutboundFrame::Error {
                error: ProtocolError::RouteNotAllowed.code(),
            })
            .await;
        return;
    }

    let envelope = Envelope::new(from, to, kind, payload, id, correlation_id);
    let envelope_id = envelope.id.clone();
    let outcome = state.router.route(envelope);

    let _ = handle
        .send(OutboundFrame::Sent {
            id: envelope_id,
            delivered_to: outcome.delivered_to,
            queued: outcome.queued,
            ts: chrono::Utc::now(),
        })
        .await;
}
