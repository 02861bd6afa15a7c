//! Cross-encoder reranking: a second-pass scorer applied to the fused
//! candidate list. Sends a single batch request with all query-document
//! pairs instead of one model call per candidate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RerankerConfig;
use crate::error::{Result, RetrievalError};
use crate::models::ScoredDocument;

const SERVICE: &str = "reranker";

/// Scores (query, passage) pairs with a cross-encoder model. The response
/// is keyed by the caller-supplied document id.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Returns `(doc_id, score)` pairs, best first, at most `top_n` of them.
    async fn score(
        &self,
        query: &str,
        passages: &[(String, String)],
        top_n: usize,
    ) -> Result<Vec<(String, f32)>>;
}

/// Rerank fused candidates against the query.
///
/// On success every surviving candidate gets `score` and `rerank_score`
/// overwritten with the service's score; id, content, title, and the earlier
/// per-signal scores are preserved. Candidates whose id the service response
/// does not resolve are dropped with a warning. The caller handles upstream
/// failures by falling back to the fused ranking.
pub async fn rerank_candidates(
    reranker: &dyn Reranker,
    query: &str,
    candidates: &[ScoredDocument],
    top_k: usize,
) -> Result<Vec<ScoredDocument>> {
    if query.trim().is_empty() {
        return Err(RetrievalError::InvalidArgument(
            "rerank query must not be empty".to_string(),
        ));
    }
    if candidates.is_empty() {
        return Err(RetrievalError::InvalidArgument(
            "rerank candidate list must not be empty".to_string(),
        ));
    }
    if top_k < 1 {
        return Err(RetrievalError::InvalidArgument(
            "top_k must be at least 1".to_string(),
        ));
    }

    let passages: Vec<(String, String)> = candidates
        .iter()
        .map(|c| (c.id.clone(), c.content.clone()))
        .collect();

    let scored = reranker
        .score(query, &passages, top_k.min(candidates.len()))
        .await?;

    let mut reranked = Vec::with_capacity(scored.len().min(top_k));
    for (doc_id, score) in scored.into_iter().take(top_k) {
        match candidates.iter().find(|c| c.id == doc_id) {
            Some(original) => {
                let mut doc = original.clone();
                doc.score = score;
                doc.rerank_score = Some(score);
                reranked.push(doc);
            }
            None => {
                tracing::warn!(%doc_id, "reranker returned an unknown document id, dropping");
            }
        }
    }

    Ok(reranked)
}

// ─── HTTP adapter ────────────────────────────────────────

#[derive(Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<RerankDocument>,
    top_n: usize,
}

#[derive(Serialize)]
struct RerankDocument {
    doc_id: String,
    text: String,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    doc_id: String,
    relevance_score: f32,
}

/// Reranker client for a `/v1/rerank`-style endpoint.
pub struct HttpReranker {
    client: reqwest::Client,
    base_url: String,
    config: RerankerConfig,
}

impl HttpReranker {
    /// Returns None when no reranker endpoint is configured.
    pub fn from_config(client: reqwest::Client, config: RerankerConfig) -> Option<Self> {
        let base_url = config.base_url.clone()?;
        Some(Self {
            client,
            base_url,
            config,
        })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(
        &self,
        query: &str,
        passages: &[(String, String)],
        top_n: usize,
    ) -> Result<Vec<(String, f32)>> {
        let url = format!("{}/v1/rerank", self.base_url.trim_end_matches('/'));

        let req = RerankRequest {
            model: self.config.model.clone(),
            query: query.to_string(),
            documents: passages
                .iter()
                .map(|(doc_id, text)| RerankDocument {
                    doc_id: doc_id.clone(),
                    text: text.clone(),
                })
                .collect(),
            top_n,
        };

        let timeout = Duration::from_secs(self.config.timeout_secs.min(30));

        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&req)
            .send()
            .await
            .map_err(|e| RetrievalError::from_transport(SERVICE, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::rejected(SERVICE, format!("{status}: {body}")));
        }

        let body: RerankResponse = resp
            .json()
            .await
            .map_err(|e| RetrievalError::unavailable(SERVICE, format!("unparseable response: {e}")))?;

        let mut results: Vec<(String, f32)> = body
            .results
            .into_iter()
            .map(|r| (r.doc_id, r.relevance_score))
            .collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(results)
    }
}
