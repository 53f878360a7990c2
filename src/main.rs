mod config;
mod data_uri;
mod error;
mod gemini;
mod ingest;
mod models;
mod orchestrator;
mod pdf;
mod prompt;
mod routes;
mod session;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Config, gemini::GeminiClient, routes::{router, AppState}};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    tracing::info!(
        image_model = %config.gemini.image_model,
        analysis_model = %config.gemini.analysis_model,
        "Using Gemini at {}", config.gemini.base_url
    );

    let gemini = GeminiClient::new(config.gemini.clone()).context("failed to build Gemini client")?;
    let state = AppState::new(Arc::new(gemini), config.default_style.clone());
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
