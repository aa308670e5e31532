//! Scout Chat - research chat agent
//!
//! Serves a chat page backed by a turn controller that can consult web,
//! arXiv and Wikipedia search, asking a human operator before any web search.

mod api;
mod config;
mod db;
mod llm;
mod runtime;
mod state_machine;
mod system_prompt;
mod tools;

use api::{create_router, AppState};
use config::Config;
use db::Database;
use llm::{LlmService, LoggingService, OpenAIService};
use runtime::{
    CheckpointStore, InMemoryCheckpointStore, LlmServiceClient, SqliteCheckpointStore,
    ToolRegistryExecutor, TurnController,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tools::ToolRegistry;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Arc::new(Config::from_env());
    if let Err(e) = config.validate() {
        tracing::warn!(error = %e, "Model or search calls will fail until configured");
    }
    tracing::info!(
        model = %config.model,
        tracing_key = config.tracing_api_key.is_some(),
        "Configuration loaded"
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("scout-chat/", env!("CARGO_PKG_VERSION")))
        .build()?;

    // Checkpoint store
    let store: Arc<dyn CheckpointStore> = match &config.db_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %path.display(), "Opening checkpoint database");
            Arc::new(SqliteCheckpointStore::new(Database::open(path)?))
        }
        None => {
            tracing::info!("SCOUT_DB_PATH not set; checkpoints are kept in memory");
            Arc::new(InMemoryCheckpointStore::new())
        }
    };

    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(OpenAIService::new(
        http.clone(),
        &config,
    ))));
    let tools = ToolRegistryExecutor::new(
        ToolRegistry::from_config(&config),
        http,
        config.clone(),
    );

    let controller = TurnController::new(store, LlmServiceClient::new(llm), tools);
    tracing::info!(model = %controller.model_id(), "Turn controller ready");

    let state = AppState::new(controller);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Scout Chat listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
