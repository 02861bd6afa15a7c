use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::models::{QuickAnswer, RecommendedQuestion};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_kb_type")]
    pub kb_type: String,
    /// Cursor key: recommendations already shown to this session are
    /// skipped until the pool is exhausted for it.
    #[serde(default)]
    pub session_id: String,
}

fn default_count() -> usize {
    3
}

fn default_kb_type() -> String {
    "all".to_string()
}

/// Listing entry: everything but the canned answer.
#[derive(Debug, serde::Serialize)]
pub struct RecommendationItem {
    pub id: String,
    pub question: String,
    pub category: String,
    pub kb_type: String,
}

impl From<RecommendedQuestion> for RecommendationItem {
    fn from(q: RecommendedQuestion) -> Self {
        Self {
            id: q.id,
            question: q.question,
            category: q.category,
            kb_type: q.kb_type,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RecommendationItem>,
}

/// GET /api/recommended-questions — sample conversation starters.
pub async fn recommended_questions(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Json<RecommendationResponse> {
    // Anonymous callers share one cursor; passing a session id gives each
    // caller an independent rotation.
    let session_key = if params.session_id.is_empty() {
        "anonymous"
    } else {
        params.session_id.as_str()
    };

    let recommendations = state
        .recommendations
        .sample(session_key, params.count, &params.kb_type)
        .into_iter()
        .map(RecommendationItem::from)
        .collect();

    Json(RecommendationResponse { recommendations })
}

/// GET /api/quick-answer/{question_id} — canned answer for a recommended
/// question.
pub async fn quick_answer(
    State(state): State<AppState>,
    Path(question_id): Path<String>,
) -> Result<Json<QuickAnswer>, (StatusCode, String)> {
    state
        .recommendations
        .quick_answer(&question_id)
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!(
                    "question id '{question_id}' not found; list available ids via /api/recommended-questions"
                ),
            )
        })
}
