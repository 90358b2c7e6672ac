mod backend;
mod clustering;
mod config;
mod errors;
mod highlights;
mod models;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::ollama::OllamaBackend;
use crate::backend::ModelBackend;
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{HighlightStore, JsonFileStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Marginalia API v{}", env!("CARGO_PKG_VERSION"));

    // Profile document store
    let store: Arc<dyn HighlightStore> = Arc::new(JsonFileStore::open(&config.data_path)?);
    info!("Profile store ready at {}", config.data_path);

    // Local model runtime
    let backend: Arc<dyn ModelBackend> = Arc::new(OllamaBackend::new(
        &config.model_runtime_url,
        &config.model_name,
    ));
    info!(
        "Model backend: {} via {}",
        config.model_name, config.model_runtime_url
    );

    let state = AppState { store, backend };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
