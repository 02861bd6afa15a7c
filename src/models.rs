use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A passage stored in the document store. Immutable once indexed; retrieval
/// only ever references it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub title: String,
}

/// A document plus its ranking signals. `score` always reflects the most
/// recent stage that touched the document (fusion, then rerank); the
/// per-signal scores are kept for observability and never erased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: String,
    pub content: String,
    pub title: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl ScoredDocument {
    pub fn from_document(doc: Document, score: f32) -> Self {
        Self {
            id: doc.id,
            content: doc.content,
            title: doc.title,
            score,
            vector_score: None,
            keyword_score: None,
            rerank_score: None,
        }
    }
}

/// Parameters for one retrieval call. Transient: built, validated, and
/// discarded within a single request.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: usize,
    pub min_score: f32,
    pub kb_scope: String,
}

impl RetrievalRequest {
    /// Reject malformed requests before any network call is issued.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.query.trim().is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "query must not be empty".to_string(),
            ));
        }
        if self.top_k < 1 {
            return Err(RetrievalError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        if self.min_score < 0.0 {
            return Err(RetrievalError::InvalidArgument(
                "min_score must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-signal score multipliers applied before fusion. They scale each
/// signal independently and need not sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector_weight: f32,
    pub keyword_weight: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector_weight: 0.7,
            keyword_weight: 0.3,
        }
    }
}

/// A single chat turn (user or assistant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

// ─── API payloads ────────────────────────────────────────

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub kb_scope: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: f32,
}

fn default_top_k() -> usize {
    3
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredDocument>,
}

/// Chat request. An empty/missing session id asks the server to mint one.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub kb_scope: String,
    #[serde(default)]
    pub session_id: String,
}

/// Chat response
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub session_id: String,
}

/// Citation sent back with an answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub id: String,
    pub title: String,
    pub score: f32,
}

impl From<&ScoredDocument> for SourceRef {
    fn from(doc: &ScoredDocument) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            score: doc.score,
        }
    }
}

/// Clear-context request
#[derive(Debug, Clone, Deserialize)]
pub struct ClearRequest {
    pub session_id: String,
}

/// A question offered to the user as a conversation starter. The canned
/// answer is served only by the quick-answer endpoint; recommendation
/// listings expose the other fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedQuestion {
    pub id: String,
    pub question: String,
    pub category: String,
    pub kb_type: String,
    #[serde(default)]
    pub answer: String,
}

/// Canned answer for a recommended question.
#[derive(Debug, Clone, Serialize)]
pub struct QuickAnswer {
    pub id: String,
    pub question: String,
    pub answer: String,
}
