//! Standalone migration runner.
//!
//! Run with: cargo run --bin migration -- --database-url <url>
//! Falls back to the DATABASE_URL environment variable.

use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "migration", about = "Run Happy Hopz database migrations")]
struct Args {
    /// Database connection string; DATABASE_URL is used when omitted
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://happy_hopz.sqlite?mode=rwc".to_string());

    info!("Starting database migration");
    happy_hopz_api::migrator::run_migration(&database_url).await?;
    info!("Migration completed successfully");

    Ok(())
}
