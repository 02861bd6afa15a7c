use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Result, RetrievalError};

const SERVICE: &str = "embedding service";

/// Maximum characters to send per text to the embedding API. Embedding
/// models commonly carry an 8 192-token context; prose tokenises at roughly
/// 1 token per 2-3 chars, so 6 000 chars stays safely under the limit even
/// for dense content.
const MAX_EMBED_CHARS: usize = 6_000;

/// Turns text into a fixed-dimension dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The fixed vector dimension this embedder produces.
    fn dimension(&self) -> usize;
}

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char
/// boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ─── OpenAI-compatible adapter ───────────────────────────

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Embedding client for an OpenAI-compatible `/v1/embeddings` endpoint.
/// Makes exactly one attempt per call; the retry policy lives with the
/// orchestrator.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: EmbeddingConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "embedding input must not be empty".to_string(),
            ));
        }

        let url = format!("{}/v1/embeddings", self.config.base_url.trim_end_matches('/'));
        let req = EmbedRequest {
            model: self.config.model.clone(),
            input: vec![truncate_for_embedding(text).to_string()],
        };

        let mut builder = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&req);
        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| RetrievalError::from_transport(SERVICE, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::rejected(SERVICE, format!("{status}: {body}")));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| RetrievalError::unavailable(SERVICE, format!("unparseable response: {e}")))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::unavailable(SERVICE, "no embedding returned"))?;

        if vector.len() != self.config.dimension {
            return Err(RetrievalError::rejected(
                SERVICE,
                format!(
                    "expected dimension {}, got {}",
                    self.config.dimension,
                    vector.len()
                ),
            ));
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}
