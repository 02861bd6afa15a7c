//! The hybrid retriever orchestrates one retrieval request end to end:
//!
//! ```text
//! Validating ──▶ Embedding ──▶ Searching ──▶ Fusing ──▶ (Reranking) ──▶ Done
//!      │             │             │            │            │
//!      └─────────────┴─────────────┴────────────┴────────────┘
//!                            Failed (any stage)
//! ```
//!
//! Vector and keyword search run concurrently so the searching stage costs
//! `max(vector_latency, keyword_latency)`, not their sum. Embedding and
//! search failures are fatal to the request; a reranking failure falls back
//! to the fused ranking instead.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::llm::rerank::rerank_candidates;
use crate::llm::{Embedder, Reranker};
use crate::models::{FusionWeights, RetrievalRequest, ScoredDocument};
use crate::retry::{with_retries, RetryPolicy};
use crate::search::fusion::{fuse, FusionLimit};
use crate::search::SearchBackend;

/// Pipeline stage names, used to attribute aggregate failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Embedding,
    Searching,
    Fusing,
    Reranking,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Embedding => "embedding",
            Stage::Searching => "searching",
            Stage::Fusing => "fusing",
            Stage::Reranking => "reranking",
        };
        f.write_str(name)
    }
}

pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn SearchBackend>,
    reranker: Option<Arc<dyn Reranker>>,
    weights: FusionWeights,
    retry: RetryPolicy,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn SearchBackend>,
        reranker: Option<Arc<dyn Reranker>>,
        weights: FusionWeights,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            backend,
            reranker,
            weights,
            retry,
        }
    }

    /// Convenience constructor without retries, for tests and embedded use.
    pub fn without_retries(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn SearchBackend>,
        reranker: Option<Arc<dyn Reranker>>,
        weights: FusionWeights,
    ) -> Self {
        Self::new(embedder, backend, reranker, weights, RetryPolicy::none())
    }

    /// Run one retrieval request through the pipeline and return at most
    /// `top_k` scored documents, best first.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<ScoredDocument>> {
        // Validating: no network call is issued for a malformed request.
        request.validate()?;
        let query = request.query.trim();

        // Embedding: fatal on failure; keyword-only degradation is
        // deliberately not offered here.
        let query_vector = with_retries("embedding service", self.retry, || {
            self.embedder.embed(query)
        })
        .await?;

        // Searching: both signals in flight at once, both must settle
        // before fusion.
        let fetch_limit = request.top_k * 2;
        let (vector_result, keyword_result) = tokio::join!(
            with_retries("document store", self.retry, || {
                self.backend
                    .search_vector(&request.kb_scope, &query_vector, fetch_limit)
            }),
            with_retries("document store", self.retry, || {
                self.backend
                    .search_keyword(&request.kb_scope, query, request.top_k)
            }),
        );
        let vector_hits = vector_result.map_err(|e| e.in_stage(Stage::Searching))?;
        let keyword_hits = keyword_result.map_err(|e| e.in_stage(Stage::Searching))?;

        tracing::debug!(
            kb_scope = %request.kb_scope,
            vector_hits = vector_hits.len(),
            keyword_hits = keyword_hits.len(),
            "search signals collected"
        );

        // Fusing: deterministic merge; oversample when a reranker follows.
        let limit = if self.reranker.is_some() {
            FusionLimit::OversampledFor(request.top_k)
        } else {
            FusionLimit::Exact(request.top_k)
        };
        let mut fused = fuse(
            vector_hits,
            keyword_hits,
            self.weights,
            request.min_score,
            limit,
        );

        // Reranking: only worth entering when there is more than one page of
        // candidates to reorder; never fatal.
        if let Some(reranker) = self.reranker.as_deref() {
            if fused.len() > request.top_k {
                let reranked = with_retries("reranker", self.retry, || {
                    rerank_candidates(reranker, query, &fused, request.top_k)
                })
                .await;
                match reranked {
                    Ok(reranked) => fused = reranked,
                    Err(err) => {
                        tracing::warn!(
                            kb_scope = %request.kb_scope,
                            "reranking failed, falling back to fused ranking: {err}"
                        );
                    }
                }
            }
        }

        fused.truncate(request.top_k);
        Ok(fused)
    }
}

/// Build a retry policy from config values.
pub fn retry_policy(attempts: u32, base_ms: u64) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(base_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::RetrievalError;
    use crate::models::Document;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            content: format!("content {id}"),
            title: format!("title {id}"),
        }
    }

    fn request(query: &str, top_k: usize) -> RetrievalRequest {
        RetrievalRequest {
            query: query.to_string(),
            top_k,
            min_score: 0.0,
            kb_scope: "general".to_string(),
        }
    }

    // ─── Fakes ───────────────────────────────────────────

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingEmbedder {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RetrievalError::unavailable("embedding service", "down"))
            } else {
                Ok(vec![1.0, 0.0, 0.0])
            }
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[derive(Default)]
    struct ScriptedBackend {
        vector: Vec<(Document, f32)>,
        keyword: Vec<(Document, f32)>,
        vector_calls: AtomicUsize,
        keyword_calls: AtomicUsize,
        missing_index: bool,
    }

    #[async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn search_vector(
            &self,
            kb_scope: &str,
            _query_vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<(Document, f32)>> {
            self.vector_calls.fetch_add(1, Ordering::SeqCst);
            if self.missing_index {
                return Err(RetrievalError::IndexNotFound(kb_scope.to_string()));
            }
            Ok(self.vector.clone())
        }

        async fn search_keyword(
            &self,
            kb_scope: &str,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<(Document, f32)>> {
            self.keyword_calls.fetch_add(1, Ordering::SeqCst);
            if self.missing_index {
                return Err(RetrievalError::IndexNotFound(kb_scope.to_string()));
            }
            Ok(self.keyword.clone())
        }

        async fn scope_exists(&self, _kb_scope: &str) -> Result<bool> {
            Ok(!self.missing_index)
        }
    }

    struct AlwaysFailingReranker {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reranker for AlwaysFailingReranker {
        async fn score(
            &self,
            _query: &str,
            _passages: &[(String, String)],
            _top_n: usize,
        ) -> Result<Vec<(String, f32)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RetrievalError::unavailable("reranker", "sidecar down"))
        }
    }

    struct RecordingReranker {
        seen: Mutex<Vec<String>>,
        results: Vec<(String, f32)>,
    }

    #[async_trait]
    impl Reranker for RecordingReranker {
        async fn score(
            &self,
            _query: &str,
            passages: &[(String, String)],
            _top_n: usize,
        ) -> Result<Vec<(String, f32)>> {
            *self.seen.lock() = passages.iter().map(|(id, _)| id.clone()).collect();
            Ok(self.results.clone())
        }
    }

    fn retriever_with(
        embedder: CountingEmbedder,
        backend: ScriptedBackend,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> HybridRetriever {
        HybridRetriever::without_retries(
            Arc::new(embedder),
            Arc::new(backend),
            reranker,
            FusionWeights {
                vector_weight: 0.7,
                keyword_weight: 0.3,
            },
        )
    }

    // ─── Validation ──────────────────────────────────────

    #[tokio::test]
    async fn test_empty_query_rejected_before_any_call() {
        let embedder = CountingEmbedder::ok();
        let backend = ScriptedBackend::default();

        let embedder_arc = Arc::new(embedder);
        let backend_arc = Arc::new(backend);
        let retriever = HybridRetriever::without_retries(
            embedder_arc.clone(),
            backend_arc.clone(),
            None,
            FusionWeights::default(),
        );

        let err = retriever.retrieve(&request("   ", 3)).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArgument(_)));
        assert_eq!(embedder_arc.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend_arc.vector_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend_arc.keyword_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected_before_any_call() {
        let embedder_arc = Arc::new(CountingEmbedder::ok());
        let retriever = HybridRetriever::without_retries(
            embedder_arc.clone(),
            Arc::new(ScriptedBackend::default()),
            None,
            FusionWeights::default(),
        );

        let err = retriever.retrieve(&request("q", 0)).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArgument(_)));
        assert_eq!(embedder_arc.calls.load(Ordering::SeqCst), 0);
    }

    // ─── Embedding stage ─────────────────────────────────

    #[tokio::test]
    async fn test_embedding_failure_is_fatal() {
        let backend_arc = Arc::new(ScriptedBackend {
            vector: vec![(doc("a"), 0.9)],
            ..Default::default()
        });
        let retriever = HybridRetriever::without_retries(
            Arc::new(CountingEmbedder::failing()),
            backend_arc.clone(),
            None,
            FusionWeights::default(),
        );

        let err = retriever.retrieve(&request("q", 3)).await.unwrap_err();
        assert!(err.is_transient());
        // No search was attempted after the embedding failed.
        assert_eq!(backend_arc.vector_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend_arc.keyword_calls.load(Ordering::SeqCst), 0);
    }

    // ─── Searching stage ─────────────────────────────────

    #[tokio::test]
    async fn test_both_searches_issued() {
        let backend_arc = Arc::new(ScriptedBackend {
            vector: vec![(doc("a"), 0.9)],
            keyword: vec![(doc("b"), 5.0)],
            ..Default::default()
        });
        let retriever = HybridRetriever::without_retries(
            Arc::new(CountingEmbedder::ok()),
            backend_arc.clone(),
            None,
            FusionWeights::default(),
        );

        let results = retriever.retrieve(&request("q", 3)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(backend_arc.vector_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend_arc.keyword_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_index_surfaces_as_retrieval_failed() {
        let retriever = retriever_with(
            CountingEmbedder::ok(),
            ScriptedBackend {
                missing_index: true,
                ..Default::default()
            },
            None,
        );

        let err = retriever.retrieve(&request("q", 3)).await.unwrap_err();
        match err {
            RetrievalError::RetrievalFailed { stage, source } => {
                assert_eq!(stage, Stage::Searching);
                assert!(matches!(*source, RetrievalError::IndexNotFound(_)));
            }
            other => panic!("expected RetrievalFailed, got {other:?}"),
        }
    }

    // ─── Fusing + result shaping ─────────────────────────

    #[tokio::test]
    async fn test_results_truncated_to_top_k() {
        let vector: Vec<_> = (0..8).map(|i| (doc(&format!("d{i}")), 1.0 - i as f32 * 0.1)).collect();
        let retriever = retriever_with(
            CountingEmbedder::ok(),
            ScriptedBackend {
                vector,
                ..Default::default()
            },
            None,
        );

        let results = retriever.retrieve(&request("q", 3)).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "d0");
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_results_not_error() {
        let retriever = retriever_with(CountingEmbedder::ok(), ScriptedBackend::default(), None);
        let results = retriever.retrieve(&request("q", 3)).await.unwrap();
        assert!(results.is_empty());
    }

    // ─── Reranking stage ─────────────────────────────────

    #[tokio::test]
    async fn test_rerank_failure_falls_back_to_fused_ranking() {
        let vector: Vec<_> = (0..6).map(|i| (doc(&format!("d{i}")), 1.0 - i as f32 * 0.1)).collect();
        let failing = Arc::new(AlwaysFailingReranker {
            calls: AtomicUsize::new(0),
        });

        // Baseline: same inputs, no reranker at all.
        let plain = retriever_with(
            CountingEmbedder::ok(),
            ScriptedBackend {
                vector: vector.clone(),
                ..Default::default()
            },
            None,
        );
        let baseline = plain.retrieve(&request("q", 3)).await.unwrap();

        let retriever = retriever_with(
            CountingEmbedder::ok(),
            ScriptedBackend {
                vector,
                ..Default::default()
            },
            Some(failing.clone()),
        );
        let results = retriever.retrieve(&request("q", 3)).await.unwrap();

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        let ids: Vec<&str> = results.iter().map(|d| d.id.as_str()).collect();
        let baseline_ids: Vec<&str> = baseline.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, baseline_ids);
        assert!(results.iter().all(|d| d.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn test_rerank_skipped_when_candidates_fit_in_top_k() {
        let failing = Arc::new(AlwaysFailingReranker {
            calls: AtomicUsize::new(0),
        });
        let retriever = retriever_with(
            CountingEmbedder::ok(),
            ScriptedBackend {
                vector: vec![(doc("only"), 0.9)],
                ..Default::default()
            },
            Some(failing.clone()),
        );

        let results = retriever.retrieve(&request("q", 3)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerank_reorders_and_receives_oversampled_candidates() {
        let vector: Vec<_> = (0..6).map(|i| (doc(&format!("d{i}")), 1.0 - i as f32 * 0.1)).collect();
        let reranker = Arc::new(RecordingReranker {
            seen: Mutex::new(Vec::new()),
            results: vec![("d3".to_string(), 0.9), ("d0".to_string(), 0.2)],
        });

        let retriever = retriever_with(
            CountingEmbedder::ok(),
            ScriptedBackend {
                vector,
                ..Default::default()
            },
            Some(reranker.clone()),
        );

        let results = retriever.retrieve(&request("q", 2)).await.unwrap();
        // Oversampling handed top_k*2 candidates to the reranker.
        assert_eq!(reranker.seen.lock().len(), 4);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "d3");
        assert_eq!(results[0].rerank_score, Some(0.9));
        // Fusion provenance survives the rerank.
        assert!(results[0].vector_score.is_some());
    }
}
