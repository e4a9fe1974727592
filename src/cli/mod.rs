// cli/mod.rs - Command-line entry: `serve` (default) and `migrate`

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::config;
use crate::database::{DatabaseManager, PgStore, Store};
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "affiliate-hub-api")]
#[command(about = "Affiliate Hub API server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides SERVER_PORT/PORT)")]
        port: Option<u16>,

        #[arg(long, help = "Apply pending database migrations before serving")]
        migrate: bool,
    },

    #[command(about = "Apply pending database migrations and exit")]
    Migrate,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Serve {
        port: None,
        migrate: false,
    });

    match command {
        Command::Serve { port, migrate } => serve(port, migrate).await,
        Command::Migrate => migrate().await,
    }
}

async fn migrate() -> anyhow::Result<()> {
    let config = config::config();
    info!("Migrating {}", config.redacted_database_url());

    let pool = DatabaseManager::lazy_pool(&config.database)?;
    DatabaseManager::migrate(&pool).await?;
    Ok(())
}

async fn serve(port: Option<u16>, migrate: bool) -> anyhow::Result<()> {
    let mut config = config::config().clone();
    config.validate()?;
    if let Some(port) = port {
        config.server.port = port;
    }

    info!("Starting Affiliate Hub API in {:?} mode", config.environment);
    info!("Database: {}", config.redacted_database_url());

    let pool = DatabaseManager::lazy_pool(&config.database)?;
    if migrate {
        DatabaseManager::migrate(&pool).await?;
    }
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    let limiter = RateLimiter::from_config(&config)
        .await
        .context("failed to initialize rate limiter")?;
    if limiter.is_enabled() {
        info!(
            "Rate limiting: {} requests per {}s ({:?} backend)",
            config.api.rate_limit_requests, config.api.rate_limit_window_secs, config.api.rate_limit_backend
        );
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, store, limiter);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(
        listener,
        crate::app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
