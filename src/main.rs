use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_server::config::Config;
use relay_server::context::AppContext;
use relay_server::crypto::KeyStore;
use relay_server::relay::RelayService;
use relay_server::routes;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Relay Server Starting ===");
    info!("Port: {}", config.port);

    // Load key material (startup-fatal if malformed; never per-request)
    let keys = Arc::new(
        KeyStore::from_config(&config.crypto).context("Failed to load key material")?,
    );
    info!(
        signer_key_id = %keys.signer_key_id(),
        trusted_key_id = %keys.trusted_key_id(),
        recipient_key_id = %keys.recipient_key_id(),
        "Key material loaded"
    );

    // Initialize the relay: one producer and one consumer for the process
    // lifetime, never per request.
    info!("Connecting to Kafka...");
    let relay = Arc::new(
        RelayService::new(&config, keys).context("Failed to initialize relay service")?,
    );
    info!("Connected to Kafka");

    let app_context = Arc::new(AppContext::new(config.clone(), relay.clone()));
    let app = routes::create_router(app_context);

    // Start server
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("Failed to parse bind address")?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Relay server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain in-flight messages before exit.
    relay.shutdown()?;
    info!("Relay server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
