use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;

use product_rag::{logging, server, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();
    logging::init();

    let config = Config::load().context("Failed to load configuration")?;
    let state = Arc::new(AppState::from_config(&config).context("Failed to start product RAG server")?);

    tracing::info!(
        provider = ?config.provider,
        products = state.catalog.len(),
        top_k = config.top_k,
        "Catalog loaded"
    );

    if config.auto_init {
        match state.index().initialize(state.catalog.products()).await {
            Ok(count) => tracing::info!(documents = count, "RAG system initialized at startup"),
            Err(e) => tracing::warn!("Startup initialization failed, POST /init to retry: {}", e),
        }
    }

    if let Some(dir) = &state.static_dir {
        tracing::info!("Serving static files from {}", dir.display());
    }

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let app = server::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
