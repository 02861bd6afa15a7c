use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use kb_search::api;
use kb_search::config::Config;
use kb_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Embedding service: {}", config.embedding.base_url);
    tracing::info!("Document store: {}", config.store.base_url);
    match &config.reranker.base_url {
        Some(url) => tracing::info!("Reranker: {url}"),
        None => tracing::info!("Reranker: disabled (fusion ranking only)"),
    }

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/search", post(api::search::search))
        .route("/api/chat", post(api::chat::chat))
        .route("/api/chat/clear", post(api::chat::clear_context))
        .route(
            "/api/recommended-questions",
            get(api::recommend::recommended_questions),
        )
        .route(
            "/api/quick-answer/{question_id}",
            get(api::recommend::quick_answer),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
