//! Main Entrypoint for the Pathwise API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the learner store (PostgreSQL when configured).
//! 3. Initializing shared services (topic graph, recommender, memory, mentor).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use pathwise_api::{
    config::Config, db::PgStore, router::create_router, state::AppState, store::InMemoryStore,
    store::LearnerStore,
};
use pathwise_core::{
    embedding::ThreadJitter,
    llm_client::{LLMClient, OpenAICompatibleClient},
    memory::{LocalMemoryStore, MemoryStore, RemoteMemoryStore},
    mentor::{DEFAULT_SYSTEM_PROMPT, MentorService},
    recommend::Recommender,
    topic::KnowledgeGraph,
};
use sqlx::PgPool;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const MENTOR_PROMPT_FILE: &str = "mentor_system.md";
const MENTOR_MEMORY_LIMIT: usize = 3;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Loads the mentor system prompt, falling back to the built-in one.
fn load_system_prompt(prompts_path: &Path) -> String {
    let path = prompts_path.join(MENTOR_PROMPT_FILE);
    match std::fs::read_to_string(&path) {
        Ok(prompt) if !prompt.trim().is_empty() => prompt,
        Ok(_) => {
            warn!(path = %path.display(), "Mentor prompt is empty, using built-in prompt");
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Mentor prompt not found, using built-in prompt");
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Learner Store ---
    let store: Arc<dyn LearnerStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .context("Failed to connect to database")?;
            let db = PgStore::new(pool);
            db.run_migrations().await?;
            info!("Database connection established and migrations are up-to-date.");
            Arc::new(db)
        }
        None => {
            warn!("DATABASE_URL not set. Learner data will be kept in memory only.");
            Arc::new(InMemoryStore::new())
        }
    };

    // --- 4. Initialize Shared Services ---
    let graph = match &config.topic_graph_path {
        Some(path) => KnowledgeGraph::from_json_file(path)
            .with_context(|| format!("Failed to load topic graph from {}", path.display()))?,
        None => KnowledgeGraph::builtin(),
    };
    info!(topics = graph.len(), "Topic graph loaded");

    let recommender = Arc::new(Recommender::new(
        Arc::new(graph),
        Arc::new(ThreadJitter),
        config.recommendation_jitter,
    ));

    let local_memory = LocalMemoryStore::with_capacity(config.memory_capacity);
    let memory: Arc<dyn MemoryStore> = match &config.memory_service_url {
        Some(url) => {
            info!(url = %url, "Using remote memory service with local fallback");
            Arc::new(RemoteMemoryStore::new(url, config.upstream_timeout, local_memory)?)
        }
        None => Arc::new(local_memory),
    };

    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.api_key)
        .with_api_base(config.provider.api_base());
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let mentor = Arc::new(MentorService::new(
        llm_client,
        memory.clone(),
        load_system_prompt(&config.prompts_path),
        config.upstream_timeout,
        MENTOR_MEMORY_LIMIT,
    ));

    let app_state = Arc::new(AppState {
        store,
        recommender,
        memory,
        mentor,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
