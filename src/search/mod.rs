//! Hybrid retrieval: the document-store capability trait, its HTTP and
//! in-memory backends, weighted score fusion, and the orchestrating
//! retriever.

pub mod fusion;
pub mod memory;
pub mod retriever;
pub mod store;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Document;

/// Query access to the document store. Both query styles return documents
/// ordered descending by raw score; raw scores are comparable only within
/// one result list, never across signals. Returning fewer than `limit`
/// results is valid.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Similarity query against a knowledge scope.
    async fn search_vector(
        &self,
        kb_scope: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(Document, f32)>>;

    /// Keyword/BM25-style query against a knowledge scope.
    async fn search_keyword(
        &self,
        kb_scope: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Document, f32)>>;

    /// Whether the scope's index exists.
    async fn scope_exists(&self, kb_scope: &str) -> Result<bool>;
}
