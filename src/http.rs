//! # HTTP control plane
//!
//! Small JSON API for operators: a health probe, a status snapshot, a
//! read endpoint over the runtime event ring, and an operator-initiated
//! send. Every `/api/*` route is gated by the `x-bridge-token` header
//! compared in constant time against the configured admin hash; if no
//! admin hash is configured, every `/api/*` call is rejected.
//!
//! Built on `axum`/`tower-http` — the teacher has no HTTP surface of its own,
//! so this follows the admin-API shape seen in the pack's `agentgateway`
//! example (state-carrying router, token middleware over a nested scope).

use crate::envelope::Envelope;
use crate::error::HttpError;
use crate::state::BridgeState;
use axum::extract::{DefaultBodyLimit, FromRequest, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// `Json` wrapper that maps extraction failures to the API's own
/// `{error:<code>}` body instead of axum's plain-text rejection — in
/// particular a body over the `DefaultBodyLimit` comes back as
/// `payload_too_large` (spec.md §4.6) rather than an unmarked 413.
struct ApiJson<T>(T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                let err = if rejection.into_response().status() == StatusCode::PAYLOAD_TOO_LARGE {
                    HttpError::PayloadTooLarge
                } else {
                    HttpError::BadRequest
                };
                Err(error_response(err))
            }
        }
    }
}

pub fn build_router(state: Arc<BridgeState>) -> Router {
    let body_limit = state.config.max_frame_bytes * 2;

    let api = Router::new()
        .route("/status", get(status))
        .route("/send", post(operator_send))
        .route("/events", get(recent_events))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin_token))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_admin_token(
    State(state): State<Arc<BridgeState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_token_hash.as_deref() else {
        return error_response(HttpError::Unauthorized);
    };
    let presented = headers
        .get("x-bridge-token")
        .and_then(|v| v.to_str().ok())
        .map(crate::util::hash_secret);

    match presented {
        Some(hash) if crate::util::constant_time_eq(expected, &hash) => next.run(request).await,
        _ => error_response(HttpError::Unauthorized),
    }
}

fn error_response(err: HttpError) -> Response {
    (err.status(), Json(json!({"error": err.code()}))).into_response()
}

#[derive(Serialize)]
struct HealthBody {
    ok: bool,
    ts: chrono::DateTime<chrono::Utc>,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        ok: true,
        ts: chrono::Utc::now(),
    })
}

#[derive(Serialize)]
struct ClientStatus {
    id: String,
    #[serde(rename = "canSendTo")]
    can_send_to: Vec<String>,
}

#[derive(Serialize)]
struct StatusBody {
    ts: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "socketPath")]
    socket_path: String,
    active: HashMap<String, usize>,
    queued: HashMap<String, usize>,
    clients: Vec<ClientStatus>,
}

async fn status(State(state): State<Arc<BridgeState>>) -> Json<StatusBody> {
    let clients = state
        .config
        .registry
        .iter()
        .map(|c| ClientStatus {
            id: c.id.clone(),
            can_send_to: c.can_send_to.iter().cloned().collect(),
        })
        .collect();

    Json(StatusBody {
        ts: chrono::Utc::now(),
        socket_path: state.config.socket_path.display().to_string(),
        active: state.connections.counts(),
        queued: state.queues.depths(),
        clients,
    })
}

#[derive(Deserialize)]
struct SendRequest {
    #[serde(rename = "asClient")]
    as_client: String,
    to: String,
    #[serde(rename = "type", default = "default_send_type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "correlationId")]
    correlation_id: Option<String>,
}

fn default_send_type() -> String {
    "message".to_string()
}

#[derive(Serialize)]
struct SendResponse {
    ok: bool,
    envelope: Envelope,
    routed: RoutedOutcome,
}

#[derive(Serialize)]
struct RoutedOutcome {
    #[serde(rename = "deliveredTo")]
    delivered_to: usize,
    queued: bool,
}

async fn operator_send(State(state): State<Arc<BridgeState>>, ApiJson(req): ApiJson<SendRequest>) -> Response {
    if req.as_client.is_empty() || req.to.is_empty() {
        return error_response(HttpError::BadRequest);
    }
    if !state.config.registry.contains(&req.as_client) || !state.config.registry.contains(&req.to) {
        return error_response(HttpError::UnknownClient);
    }
    let sender = state.config.registry.get(&req.as_client).unwrap();
    if !sender.can_route_to(&req.to) {
        return error_response(HttpError::RouteNotAllowed);
    }

    let envelope = Envelope::new(
        req.as_client,
        req.to,
        req.kind,
        req.payload,
        req.id,
        req.correlation_id,
    );
    let outcome = state.router.route(envelope.clone());

    Json(SendResponse {
        ok: true,
        envelope,
        routed: RoutedOutcome {
            delivered_to: outcome.delivered_to,
            queued: outcome.queued,
        },
    })
    .into_response()
}

#[derive(Serialize)]
struct EventsBody {
    events: Vec<crate::events::Event>,
}

async fn recent_events(State(state): State<Arc<BridgeState>>) -> Json<EventsBody> {
    Json(EventsBody {
        events: state.events.recent(200),
    })
}
