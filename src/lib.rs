//! # kb-search
//!
//! A knowledge-base question-answering service built around a hybrid
//! retrieval pipeline: dense-vector similarity search and keyword search
//! run concurrently over the same corpus, their rankings are fused with
//! weighted additive scoring, and a cross-encoder reranker refines the
//! merged list when one is configured.
//!
//! ## Retrieval pipeline
//!
//! ```text
//!                      ┌──────────────┐
//!                      │  User Query   │
//!                      └──────┬───────┘
//!                             │ embed (fatal on failure)
//!              ┌──────────────┴──────────────┐
//!              ▼                             ▼
//!      ┌──────────────┐             ┌───────────────┐
//!      │ Vector Search │             │ Keyword Search │   (concurrent)
//!      └──────┬───────┘             └───────┬───────┘
//!             │                             │
//!             └──────────────┬──────────────┘
//!                            ▼
//!               ┌──────────────────────────┐
//!               │  Weighted Additive Fusion │
//!               │  vector·w_v + keyword·w_k │
//!               │  first-seen tie-break     │
//!               └────────────┬─────────────┘
//!                            │ top_k × 2 candidates
//!                            ▼
//!               ┌──────────────────────────┐
//!               │  Cross-Encoder Rerank     │
//!               │  (falls back to fusion    │
//!               │   ranking on failure)     │
//!               └────────────┬─────────────┘
//!                            ▼
//!                      top_k results
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for the server and every
//!   external service
//! - [`models`] - Shared data types: `Document`, `ScoredDocument`,
//!   `RetrievalRequest`, request/response payloads
//! - [`error`] - The retrieval failure taxonomy
//! - [`retry`] - Bounded retry with backoff for transient upstream failures
//! - [`llm`] - Clients for the embedding, reranking, and completion services
//! - [`search`] - Document-store backends, score fusion, and the hybrid
//!   retriever
//! - [`chat`] - Conversational sessions: bounded LRU session store and the
//!   answer/apology turn logic
//! - [`recommend`] - Recommended-question sampling with per-session cursors
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state wiring config to live services

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod recommend;
pub mod retry;
pub mod search;
pub mod state;
