mod config;
mod detector;
mod events;
mod platform;
mod preview;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::events::HandlerRegistry;
use crate::preview::PreviewService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,peekbot=debug".into()),
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

    info!("Configuration loaded successfully");
    info!("  Preview body limit: {}", config.preview.max_body_length);

    // One preview service for the process, handed to the handlers that
    // need it.
    let previews = Arc::new(PreviewService::new(&config.preview));

    let mut registry = HandlerRegistry::new();
    for listener in events::default_listeners(previews) {
        registry.register(listener);
    }

    // Run the Discord bot
    info!("Bot is starting...");
    platform::discord::run(&config, registry).await?;

    Ok(())
}
