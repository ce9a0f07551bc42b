//! Error taxonomy for the bridge daemon.
//!
//! Startup failures are fatal and propagate as `anyhow::Error` from `main`.
//! Per-connection protocol errors are a closed enum whose `Display` yields
//! exactly the wire error codes clients observe in an `error` frame.

use thiserror::Error;

/// Fatal at startup: config missing/invalid, duplicate client id, bind failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("config file is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("clients list must be a non-empty array")]
    EmptyClients,

    #[error("client at index {0} is missing an identifier")]
    MissingClientId(usize),

    #[error("client at index {0} is missing a key hash")]
    MissingKeyHash(usize),

    #[error("duplicate client identifier: {0}")]
    DuplicateClientId(String),
}

/// Per-connection protocol error. `code()` is the wire value sent in an
/// `{action:"error", error:<code>}` frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("auth_required")]
    AuthRequired,
    #[error("missing_to")]
    MissingTo,
    #[error("unknown_target")]
    UnknownTarget,
    #[error("route_not_allowed")]
    RouteNotAllowed,
    #[error("unknown_action")]
    UnknownAction,
    #[error("invalid_json")]
    InvalidJson,
    #[error("message_too_large")]
    MessageTooLarge,
    #[error("buffer_exceeded")]
    BufferExceeded,
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::AuthRequired => "auth_required",
            ProtocolError::MissingTo => "missing_to",
            ProtocolError::UnknownTarget => "unknown_target",
            ProtocolError::RouteNotAllowed => "route_not_allowed",
            ProtocolError::UnknownAction => "unknown_action",
            ProtocolError::InvalidJson => "invalid_json",
            ProtocolError::MessageTooLarge => "message_too_large",
            ProtocolError::BufferExceeded => "buffer_exceeded",
        }
    }
}

/// Errors surfaced by the HTTP control plane as `{error:code}` bodies.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("unknown_client")]
    UnknownClient,
    #[error("route_not_allowed")]
    RouteNotAllowed,
    #[error("bad_request")]
    BadRequest,
    #[error("payload_too_large")]
    PayloadTooLarge,
}

impl HttpError {
    pub fn code(&self) -> &'static str {
        match self {
            HttpError::Unauthorized => "unauthorized",
            HttpError::UnknownClient => "unknown_client",
            HttpError::RouteNotAllowed => "route_not_allowed",
            HttpError::BadRequest => "bad_request",
            HttpError::PayloadTooLarge => "payload_too_large",
        }
    }

    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpError::UnknownClient | HttpError::RouteNotAllowed | HttpError::BadRequest => {
                StatusCode::BAD_REQUEST
            }
            HttpError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}
