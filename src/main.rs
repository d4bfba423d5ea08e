use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use rookery::config::Config;
use rookery::service::FeedService;
use rookery::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "rookeryd", about = "Multi-user feed sync daemon", version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "rookery.toml")]
    config: PathBuf,

    /// Override the database path from the config
    #[arg(short, long)]
    database: Option<String>,

    /// Run a single refresh cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rookery=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let db = Database::open(&config.database_path).await?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("rookeryd/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let service = FeedService::new(db, client, config.clone());

    if args.once || config.refresh_interval_minutes == 0 {
        run_cycle(&service).await;
        return Ok(());
    }

    let interval = Duration::from_secs(config.refresh_interval_minutes * 60);
    tracing::info!(
        interval_minutes = config.refresh_interval_minutes,
        "Starting refresh loop"
    );
    loop {
        run_cycle(&service).await;
        tokio::time::sleep(interval).await;
    }
}

async fn run_cycle(service: &FeedService) {
    if let Err(e) = service.refresh_all().await {
        tracing::error!(error = %e, "Refresh cycle failed");
    }
}
