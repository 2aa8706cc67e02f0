mod auth;
mod bot;
mod config;
mod forecast;
mod nickname;
mod platform;
mod updater;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,election_nick_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    match &config_path {
        Some(path) => info!("Loading configuration from: {}", path.display()),
        None => info!(
            "Loading configuration from: {} (optional)",
            config::DEFAULT_CONFIG_PATH
        ),
    }
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Command prefix: {}", config.discord.command_prefix);
    info!("  Forecast URL: {}", config.forecast.url);

    let state = Arc::new(AppState::new(&config));
    info!("  Authorized user: {}", state.operator().user_id());

    info!("Bot is starting...");
    platform::discord::run(state, &config.credentials.token).await?;

    Ok(())
}
