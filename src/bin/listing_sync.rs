//! One-shot listing sync: scrape, upsert into every target database, verify.
//!
//! Exit code is non-zero when the scrape is empty or any database failed.

use practice_ops_core::core::config::ListingSyncConfig;
use practice_ops_core::features::listings::ListingSyncService;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ListingSyncConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Only needed to discover target databases from the websites table
    let main_pool = match std::env::var("DATABASE_URL") {
        Ok(url) if config.database_urls.is_empty() => Some(
            PgPoolOptions::new()
                .max_connections(2)
                .connect(&url)
                .await
                .map_err(|e| anyhow::anyhow!("Cannot connect to main database: {}", e))?,
        ),
        _ => None,
    };

    let service = ListingSyncService::new(main_pool, config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize listing sync: {}", e))?;

    let report = service
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Listing sync failed: {}", e))?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed = report.failed_databases();
    if failed > 0 {
        anyhow::bail!("{} of {} databases failed", failed, report.databases.len());
    }

    Ok(())
}
