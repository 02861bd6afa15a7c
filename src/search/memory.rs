//! In-memory search backend. Deterministic stand-in for the HTTP store in
//! unit and integration tests, and usable as a local single-process backend.
//! Scoring mirrors the HTTP backend's shape: cosine similarity shifted by
//! +1.0 for the vector signal, word-level term overlap with a doubled title
//! weight for the keyword signal.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Result, RetrievalError};
use crate::models::Document;
use crate::search::SearchBackend;

struct Entry {
    doc: Document,
    embedding: Vec<f32>,
}

#[derive(Default)]
pub struct MemorySearchBackend {
    scopes: RwLock<HashMap<String, Vec<Entry>>>,
}

impl MemorySearchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope so queries against it succeed even while empty.
    pub fn create_scope(&self, kb_scope: &str) {
        self.scopes.write().entry(kb_scope.to_string()).or_default();
    }

    pub fn add_document(&self, kb_scope: &str, doc: Document, embedding: Vec<f32>) {
        self.scopes
            .write()
            .entry(kb_scope.to_string())
            .or_default()
            .push(Entry { doc, embedding });
    }

    pub fn document_count(&self, kb_scope: &str) -> usize {
        self.scopes
            .read()
            .get(kb_scope)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    fn with_scope<T>(
        &self,
        kb_scope: &str,
        f: impl FnOnce(&[Entry]) -> T,
    ) -> Result<T> {
        let scopes = self.scopes.read();
        let entries = scopes
            .get(kb_scope)
            .ok_or_else(|| RetrievalError::IndexNotFound(kb_scope.to_string()))?;
        Ok(f(entries))
    }
}

#[async_trait]
impl SearchBackend for MemorySearchBackend {
    async fn search_vector(
        &self,
        kb_scope: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(Document, f32)>> {
        self.with_scope(kb_scope, |entries| {
            let mut scored: Vec<(Document, f32)> = entries
                .iter()
                .map(|e| {
                    (
                        e.doc.clone(),
                        cosine_similarity(query_vector, &e.embedding) + 1.0,
                    )
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(limit);
            scored
        })
    }

    async fn search_keyword(
        &self,
        kb_scope: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Document, f32)>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();

        self.with_scope(kb_scope, |entries| {
            let mut scored: Vec<(Document, f32)> = entries
                .iter()
                .filter_map(|e| {
                    let score = term_overlap_score(&terms, &e.doc);
                    (score > 0.0).then(|| (e.doc.clone(), score))
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(limit);
            scored
        })
    }

    async fn scope_exists(&self, kb_scope: &str) -> Result<bool> {
        Ok(self.scopes.read().contains_key(kb_scope))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Count query-term word matches in content and title; title matches weigh
/// double, matching the HTTP backend's `title^2` field boost.
fn term_overlap_score(terms: &[String], doc: &Document) -> f32 {
    let mut score = 0.0f32;
    for (text, weight) in [(&doc.content, 1.0f32), (&doc.title, 2.0f32)] {
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if terms.iter().any(|t| t == word) {
                score += weight;
            }
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_scope_is_index_not_found() {
        let backend = MemorySearchBackend::new();
        let err = backend.search_keyword("nope", "q", 5).await.unwrap_err();
        assert!(matches!(err, RetrievalError::IndexNotFound(_)));
        assert!(!backend.scope_exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_scope_returns_empty_not_error() {
        let backend = MemorySearchBackend::new();
        backend.create_scope("general");
        let hits = backend.search_vector("general", &[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_similarity() {
        let backend = MemorySearchBackend::new();
        backend.add_document("kb", doc("near", "", ""), vec![1.0, 0.0, 0.0]);
        backend.add_document("kb", doc("far", "", ""), vec![0.0, 1.0, 0.0]);
        backend.add_document("kb", doc("mid", "", ""), vec![0.7, 0.7, 0.0]);

        let hits = backend.search_vector("kb", &[1.0, 0.0, 0.0], 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|(d, _)| d.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        // Shifted cosine keeps scores non-negative.
        assert!(hits.iter().all(|(_, s)| *s >= 0.0));
    }

    #[tokio::test]
    async fn test_keyword_search_boosts_title_matches() {
        let backend = MemorySearchBackend::new();
        backend.add_document(
            "kb",
            doc("in-title", "refund policy", "unrelated body"),
            vec![0.0],
        );
        backend.add_document(
            "kb",
            doc("in-body", "unrelated", "the refund takes five days"),
            vec![0.0],
        );

        let hits = backend.search_keyword("kb", "refund", 10).await.unwrap();
        assert_eq!(hits[0].0.id, "in-title");
        assert!(hits[0].1 > hits[1].1);
    }

    #[tokio::test]
    async fn test_keyword_search_skips_nonmatching_docs() {
        let backend = MemorySearchBackend::new();
        backend.add_document("kb", doc("a", "alpha", "alpha text"), vec![0.0]);
        backend.add_document("kb", doc("b", "beta", "beta text"), vec![0.0]);

        let hits = backend.search_keyword("kb", "alpha", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "a");
    }

    #[test]
    fn test_cosine_similarity_handles_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
