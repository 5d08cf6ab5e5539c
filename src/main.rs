//! cdc-demo - change-data-capture demo tooling
//!
//! `populate` generates transactional load in PostgreSQL; `materialize`
//! lands the captured product changes from Kafka into a Delta table on S3.

use anyhow::Context;
use change_materializer::{Materializer, MaterializerConfig};
use clap::{Parser, Subcommand};
use db_populator::{DbConfig, PopulateArgs, Populator, RunMode};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cdc-demo")]
#[command(about = "Change-data-capture demo: PostgreSQL load generator and Delta materializer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate customers, products and orders in PostgreSQL
    ///
    /// Connection settings are read from DB_USER, DB_PASSWORD, DB_HOST,
    /// DB_PORT and DB_NAME.
    Populate(PopulateArgs),

    /// Materialize product change events from Kafka into a Delta table
    Materialize(MaterializerConfig),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let shutdown = shutdown_on_ctrl_c();

    match cli.command {
        Commands::Populate(args) => populate(args, shutdown).await,
        Commands::Materialize(config) => {
            info!("Starting change event materializer: {:?}", config.s3_config());
            Materializer::new(config)
                .run(shutdown)
                .await
                .context("Change event materializer failed")?;
            Ok(())
        }
    }
}

async fn populate(args: PopulateArgs, shutdown: CancellationToken) -> anyhow::Result<()> {
    let config = DbConfig::from_env().context("Invalid database configuration")?;
    let Some(connected) = unless_cancelled(&shutdown, Populator::connect(&config)).await else {
        return Ok(());
    };
    let mut populator = connected
        .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;
    let Some(schema) = unless_cancelled(&shutdown, populator.ensure_schema()).await else {
        return Ok(());
    };
    schema.context("Failed to create tables")?;

    match args.mode() {
        RunMode::Bulk { count } => {
            populator
                .bulk_insert_until_cancelled(count, &shutdown)
                .await
                .with_context(|| format!("Bulk insert of {count} rows failed"))?;
        }
        RunMode::Continuous => {
            populator
                .run_continuous(shutdown)
                .await
                .context("Simulation failed")?;
        }
    }
    Ok(())
}

/// Await `fut` unless `shutdown` fires first, in which case `fut` is dropped.
async fn unless_cancelled<F: Future>(shutdown: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            info!("Stopped before startup completed");
            None
        }
        out = fut => Some(out),
    }
}

/// Cancel the returned token on the first Ctrl+C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                trigger.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {e}"),
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_subcommand() {
        let cli = Cli::try_parse_from(["cdc-demo", "populate", "--bulk", "1000"]).unwrap();
        match cli.command {
            Commands::Populate(args) => assert_eq!(args.mode(), RunMode::Bulk { count: 1000 }),
            Commands::Materialize(_) => panic!("expected populate"),
        }

        let cli = Cli::try_parse_from(["cdc-demo", "populate"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Populate(args) if args.mode() == RunMode::Continuous
        ));
    }

    #[test]
    fn test_materialize_subcommand() {
        let cli =
            Cli::try_parse_from(["cdc-demo", "materialize", "--max-batch-size", "50"]).unwrap();
        match cli.command {
            Commands::Materialize(config) => assert_eq!(config.max_batch_size, 50),
            Commands::Populate(_) => panic!("expected materialize"),
        }
    }

    #[tokio::test]
    async fn test_unless_cancelled() {
        let shutdown = CancellationToken::new();
        assert_eq!(unless_cancelled(&shutdown, async { 7 }).await, Some(7));

        shutdown.cancel();
        let pending = std::future::pending::<()>();
        assert_eq!(unless_cancelled(&shutdown, pending).await, None);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["cdc-demo"]).is_err());
    }
}
