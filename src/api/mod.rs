//! Axum HTTP handlers. Handlers validate input, delegate to the retrieval
//! and chat layers, and translate the error taxonomy into HTTP statuses;
//! upstream error details go to the log, not the client.

pub mod chat;
pub mod recommend;
pub mod search;

use axum::http::StatusCode;

use crate::error::RetrievalError;

/// Map a pipeline error to an HTTP response. Caller errors become 400,
/// missing scopes 404, everything upstream 502 with a generic message.
pub fn error_response(err: &RetrievalError) -> (StatusCode, String) {
    match err {
        RetrievalError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        RetrievalError::IndexNotFound(scope) => (
            StatusCode::NOT_FOUND,
            format!("knowledge scope not found: {scope}"),
        ),
        RetrievalError::RetrievalFailed { source, .. } => error_response(source),
        RetrievalError::UpstreamUnavailable { .. } | RetrievalError::UpstreamRejected { .. } => (
            StatusCode::BAD_GATEWAY,
            "retrieval backend unavailable".to_string(),
        ),
    }
}
