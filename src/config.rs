use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::FusionWeights;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Where the recommended-question pool lives
    pub data_dir: PathBuf,
    /// Embedding service configuration
    pub embedding: EmbeddingConfig,
    /// Document store configuration
    pub store: StoreConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Completion (answer generation) configuration
    pub completion: CompletionConfig,
    /// Retrieval pipeline tuning
    pub retrieval: RetrievalConfig,
    /// Maximum concurrently tracked chat sessions (LRU-evicted beyond this)
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings API
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Expected vector dimension; responses with a different length are rejected
    pub dimension: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the document store's search API
    pub base_url: String,
    pub api_key: Option<String>,
    /// Physical index name is `{index_prefix}_{kb_scope}`
    pub index_prefix: String,
    pub timeout_secs: u64,
}

/// Configuration for the cross-encoder reranker sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the rerank API. If None, reranking is disabled and
    /// retrieval returns the fused ranking directly.
    pub base_url: Option<String>,
    pub model: String,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub weights: FusionWeights,
    pub top_k: usize,
    pub min_score: f32,
    /// Extra attempts after the first failed call to a transient upstream
    pub retry_attempts: u32,
    /// Base backoff delay, doubled per attempt
    pub retry_base_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("./data"),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            reranker: RerankerConfig::default(),
            completion: CompletionConfig::default(),
            retrieval: RetrievalConfig::default(),
            max_sessions: 1024,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "text-embedding-v2".to_string(),
            api_key: None,
            dimension: 1536,
            timeout_secs: 15,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            api_key: None,
            index_prefix: "knowledge".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "rerank-v1".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen-turbo".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            top_k: 3,
            min_score: 0.0,
            retry_attempts: 2,
            retry_base_ms: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("KB_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("KB_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("KB_SEARCH_MAX_SESSIONS") {
            if let Ok(v) = val.parse() {
                config.max_sessions = v;
            }
        }

        // Embedding service
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.embedding.dimension = d;
            }
        }

        // Document store
        if let Ok(url) = std::env::var("STORE_BASE_URL") {
            config.store.base_url = url;
        }
        if let Ok(key) = std::env::var("STORE_API_KEY") {
            config.store.api_key = Some(key);
        }
        if let Ok(prefix) = std::env::var("STORE_INDEX_PREFIX") {
            config.store.index_prefix = prefix;
        }

        // Reranker
        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = model;
        }
        if let Ok(val) = std::env::var("RERANKER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.reranker.timeout_secs = v.min(30); // Cap at 30s
            }
        }

        // Completion service
        if let Ok(url) = std::env::var("COMPLETION_BASE_URL") {
            config.completion.base_url = url;
        }
        if let Ok(model) = std::env::var("COMPLETION_MODEL") {
            config.completion.model = model;
        }
        if let Ok(key) = std::env::var("COMPLETION_API_KEY") {
            config.completion.api_key = Some(key);
        }

        // Retrieval tuning
        if let Ok(val) = std::env::var("RETRIEVAL_VECTOR_WEIGHT") {
            if let Ok(v) = val.parse() {
                config.retrieval.weights.vector_weight = v;
            }
        }
        if let Ok(val) = std::env::var("RETRIEVAL_KEYWORD_WEIGHT") {
            if let Ok(v) = val.parse() {
                config.retrieval.weights.keyword_weight = v;
            }
        }
        if let Ok(val) = std::env::var("RETRIEVAL_TOP_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.top_k = v;
            }
        }
        if let Ok(val) = std::env::var("RETRIEVAL_MIN_SCORE") {
            if let Ok(v) = val.parse() {
                config.retrieval.min_score = v;
            }
        }
        if let Ok(val) = std::env::var("RETRIEVAL_RETRY_ATTEMPTS") {
            if let Ok(v) = val.parse() {
                config.retrieval.retry_attempts = v;
            }
        }

        config
    }

    pub fn questions_path(&self) -> PathBuf {
        self.data_dir.join("recommended_questions.json")
    }
}
