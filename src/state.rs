use std::sync::Arc;

use crate::chat::session::SessionStore;
use crate::chat::ConversationEngine;
use crate::config::Config;
use crate::llm::{HttpCompletionModel, HttpEmbedder, HttpReranker, Reranker};
use crate::recommend::RecommendationPool;
use crate::search::retriever::{retry_policy, HybridRetriever};
use crate::search::store::HttpSearchBackend;

/// Shared application state. All services are long-lived, connection-pooled,
/// and safe to share across concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub retriever: Arc<HybridRetriever>,
    pub chat: Arc<ConversationEngine>,
    pub recommendations: Arc<RecommendationPool>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let embedder = Arc::new(HttpEmbedder::new(
            http_client.clone(),
            config.embedding.clone(),
        ));
        let backend = Arc::new(HttpSearchBackend::new(
            http_client.clone(),
            config.store.clone(),
        ));
        let reranker: Option<Arc<dyn Reranker>> =
            HttpReranker::from_config(http_client.clone(), config.reranker.clone())
                .map(|r| Arc::new(r) as Arc<dyn Reranker>);

        let retriever = Arc::new(HybridRetriever::new(
            embedder,
            backend,
            reranker,
            config.retrieval.weights,
            retry_policy(
                config.retrieval.retry_attempts,
                config.retrieval.retry_base_ms,
            ),
        ));

        let completion = Arc::new(HttpCompletionModel::new(
            http_client,
            config.completion.clone(),
        ));
        let chat = Arc::new(ConversationEngine::new(
            retriever.clone(),
            completion,
            SessionStore::new(config.max_sessions),
            config.retrieval.top_k,
            config.retrieval.min_score,
        ));

        let recommendations = Arc::new(RecommendationPool::load(&config.questions_path())?);

        Ok(Self {
            config,
            retriever,
            chat,
            recommendations,
        })
    }
}
