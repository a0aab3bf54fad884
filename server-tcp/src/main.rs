use shared::config::Config;
use std::sync::Arc;
use tally::{KeyValueStore, MemoryStore};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables from .env file (if exists)
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let listener = TcpListener::bind(config.store_addr()).await?;
    info!("TCP store listening on tcp://{}", config.store_addr());

    tokio::select! {
        result = server_tcp::serve(listener, store, config.max_frame_bytes) => result?,
        _ = shutdown_signal() => info!("Shutdown signal received, stopping store"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
