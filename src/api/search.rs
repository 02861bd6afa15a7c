use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error_response;
use crate::models::{RetrievalRequest, SearchRequest, SearchResponse};
use crate::state::AppState;

/// POST /api/search — run the hybrid retrieval pipeline for one query and
/// return the ranked documents.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = req.query.trim().to_string();

    let request = RetrievalRequest {
        query: query.clone(),
        top_k: req.top_k,
        min_score: req.min_score,
        kb_scope: req.kb_scope,
    };

    let results = state
        .retriever
        .retrieve(&request)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(SearchResponse { query, results }))
}
