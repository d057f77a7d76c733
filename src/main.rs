mod config;
mod error;
mod expander;
mod gemini;
mod generator;
mod models;
mod orchestrator;
mod routes;
mod store;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    config::AppConfig,
    expander::PromptExpander,
    gemini::GeminiImageGenerator,
    generator::{ImageGenerator, PlaceholderImageGenerator},
    orchestrator::RequestOrchestrator,
    routes::{router, AppState},
    store::InMemoryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    fmt().with_env_filter(filter).init();

    let generator: Arc<dyn ImageGenerator> = match &config.gemini.api_key {
        Some(key) => {
            tracing::info!("Using API key: {}...", &key[..key.char_indices().nth(6).map_or(key.len(), |(i, _)| i)]);
            Arc::new(GeminiImageGenerator::new(&config.gemini, key.clone()))
        }
        None => {
            tracing::info!("Using demo mode - placeholder images from {}", config.placeholder_image_base);
            Arc::new(PlaceholderImageGenerator::new(config.placeholder_image_base.clone()))
        }
    };

    let orchestrator = RequestOrchestrator::new(Arc::new(InMemoryStore::new()), PromptExpander::new(), generator);
    let app = router(AppState { orchestrator: Arc::new(orchestrator) });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
