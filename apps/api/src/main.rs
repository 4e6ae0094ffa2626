mod config;
mod db;
mod errors;
mod identity;
mod leads;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, DocumentBackend};
use crate::db::{create_pool, ensure_schema};
use crate::identity::resolve_owner;
use crate::leads::collection::DocumentCollection;
use crate::leads::memory::MemoryCollection;
use crate::leads::postgres::PgCollection;
use crate::leads::store::LeadStore;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lead Scout API v{}", env!("CARGO_PKG_VERSION"));

    let collection = build_collection(&config).await?;

    // Initialize LLM client
    let llm = LlmClient::from_config(&config)?;
    info!("LLM client initialized (endpoint: {})", config.gemini_api_url);

    // Lead store: resolve the session owner, which opens the change subscription
    let leads = Arc::new(LeadStore::new(collection, &config));
    leads
        .resolve_identity(resolve_owner(config.owner_token.as_deref()))
        .await;

    let state = AppState {
        llm,
        leads: Arc::clone(&leads),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    leads.shutdown().await;
    info!("Lead Scout API stopped");
    Ok(())
}

async fn build_collection(config: &Config) -> Result<Arc<dyn DocumentCollection>> {
    match config.document_backend {
        DocumentBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Ok(Arc::new(PgCollection::new(pool)))
        }
        DocumentBackend::Memory => {
            info!("Using in-memory document collection; leads are lost on restart");
            Ok(Arc::new(MemoryCollection::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
