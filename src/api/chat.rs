use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::models::{ChatRequest, ChatResponse, ClearRequest};
use crate::state::AppState;

/// POST /api/chat — answer one question within a session. A missing session
/// id mints a fresh one, returned in the response so the client can keep the
/// conversation going.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    if req.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question is required".to_string()));
    }
    if req.kb_scope.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "kb_scope is required".to_string()));
    }

    let session_id = if req.session_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        req.session_id
    };

    tracing::info!(%session_id, kb_scope = %req.kb_scope, "chat turn received");

    let outcome = state.chat.ask(&session_id, &req.kb_scope, &req.question).await;

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        sources: outcome.sources,
        session_id,
    }))
}

/// POST /api/chat/clear — forget a session's history. Clearing an unknown
/// session succeeds; there is nothing to leak by distinguishing the cases.
pub async fn clear_context(
    State(state): State<AppState>,
    Json(req): Json<ClearRequest>,
) -> Json<serde_json::Value> {
    state.chat.clear(&req.session_id);
    Json(serde_json::json!({ "message": "context cleared" }))
}
