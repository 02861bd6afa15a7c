//! Elasticsearch-style HTTP backend. Vector similarity runs as a
//! `script_score` cosine query (shifted by +1.0 so scores stay
//! non-negative), keyword search as a `multi_match` over content and a
//! boosted title field.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::error::{Result, RetrievalError};
use crate::models::Document;
use crate::search::SearchBackend;

const SERVICE: &str = "document store";

pub struct HttpSearchBackend {
    client: reqwest::Client,
    config: StoreConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsWrapper,
}

#[derive(Deserialize)]
struct HitsWrapper {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: f32,
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Deserialize)]
struct HitSource {
    content: String,
    #[serde(default)]
    title: String,
}

impl HttpSearchBackend {
    pub fn new(client: reqwest::Client, config: StoreConfig) -> Self {
        Self { client, config }
    }

    fn index_name(&self, kb_scope: &str) -> String {
        format!("{}_{}", self.config.index_prefix, kb_scope)
    }

    async fn run_search(
        &self,
        kb_scope: &str,
        body: serde_json::Value,
    ) -> Result<Vec<(Document, f32)>> {
        let index = self.index_name(kb_scope);
        let url = format!(
            "{}/{}/_search",
            self.config.base_url.trim_end_matches('/'),
            index
        );

        let mut builder = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body);
        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.header("Authorization", format!("ApiKey {key}"));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| RetrievalError::from_transport(SERVICE, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RetrievalError::IndexNotFound(index));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::rejected(SERVICE, format!("{status}: {text}")));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| RetrievalError::unavailable(SERVICE, format!("unparseable response: {e}")))?;

        Ok(body
            .hits
            .hits
            .into_iter()
            .map(|h| {
                (
                    Document {
                        id: h.id,
                        content: h.source.content,
                        title: h.source.title,
                    },
                    h.score,
                )
            })
            .collect())
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search_vector(
        &self,
        kb_scope: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(Document, f32)>> {
        let body = json!({
            "size": limit,
            "query": {
                "script_score": {
                    "query": { "match_all": {} },
                    "script": {
                        "source": "cosineSimilarity(params.query_vector, 'vector') + 1.0",
                        "params": { "query_vector": query_vector }
                    }
                }
            },
            "_source": ["content", "title"]
        });
        self.run_search(kb_scope, body).await
    }

    async fn search_keyword(
        &self,
        kb_scope: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Document, f32)>> {
        let body = json!({
            "size": limit,
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["content", "title^2"],
                    "type": "most_fields"
                }
            },
            "_source": ["content", "title"]
        });
        self.run_search(kb_scope, body).await
    }

    async fn scope_exists(&self, kb_scope: &str) -> Result<bool> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.index_name(kb_scope)
        );

        let resp = self
            .client
            .head(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| RetrievalError::from_transport(SERVICE, e))?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            s => Err(RetrievalError::rejected(SERVICE, format!("existence check: {s}"))),
        }
    }
}
