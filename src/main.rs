mod config;
mod messaging;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::messaging::MessagingClient;
use crate::webhook::handler::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,line_id_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let credentials = config.credentials();
    info!("Configuration loaded successfully");
    info!("  Webhook path: {}", config.server.webhook_path);
    info!("  Messaging API: {}", config.line.api_base_url);
    info!("  Signature verification: {}", config.line.verify_signature);
    if !credentials.is_complete() {
        // Not fatal: each request reports it until the deployment is fixed.
        warn!("CHANNEL_SECRET or CHANNEL_ACCESS_TOKEN is not set");
    }

    let client = MessagingClient::new(
        config.line.api_base_url.as_str(),
        credentials.channel_access_token.clone().unwrap_or_default(),
    );

    let app = handler::router(
        &config.server.webhook_path,
        AppState {
            credentials,
            push: Arc::new(client),
            verify_signature: config.line.verify_signature,
        },
    );

    let addr = &config.server.bind_address;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Webhook listening on http://{}{}", addr, config.server.webhook_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
