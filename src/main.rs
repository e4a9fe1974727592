use clap::Parser;
use tracing_subscriber::EnvFilter;

use affiliate_hub_api::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, SECURITY_JWT_SECRET etc. apply under cargo run
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("affiliate_hub_api=info,tower_http=info")),
        )
        .init();

    cli::run(Cli::parse()).await
}
