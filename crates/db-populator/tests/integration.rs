//! Integration tests for the load generator against a live PostgreSQL.
//!
//! Connection settings come from `DB_USER`, `DB_PASSWORD`, `DB_HOST`,
//! `DB_PORT` and `DB_NAME`. Each test works in its own schema.

use anyhow::{Context, Result};
use db_populator::{
    insert, DbConfig, NewCustomer, NewOrder, NewProduct, Operation, Pacing, Populator,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio_postgres::{Client, NoTls};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Connect and point `search_path` at a fresh schema.
async fn connect_isolated() -> Result<(Client, String)> {
    let config = DbConfig::from_env().context("DB_* environment variables are required")?;
    let (client, connection) = config.to_pg_config().connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {e}");
        }
    });

    let schema = format!("populator_test_{}", Uuid::new_v4().simple());
    client
        .batch_execute(&format!(
            "CREATE SCHEMA \"{schema}\"; SET search_path TO \"{schema}\""
        ))
        .await?;
    Ok((client, schema))
}

async fn drop_schema(populator: &Populator, schema: &str) -> Result<()> {
    populator
        .client()
        .batch_execute(&format!("DROP SCHEMA IF EXISTS \"{schema}\" CASCADE"))
        .await?;
    Ok(())
}

async fn isolated_populator(seed: u64) -> Result<(Populator, String)> {
    init_logging();
    let (client, schema) = connect_isolated().await?;
    let populator = Populator::with_client(client, StdRng::seed_from_u64(seed))?;
    populator.ensure_schema().await?;
    Ok((populator, schema))
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_bulk_insert_creates_n_rows_per_table() -> Result<()> {
    let (mut populator, schema) = isolated_populator(42).await?;

    let report = populator.bulk_insert(1000).await?;

    assert_eq!(report.customer_ids.len(), 1000);
    assert_eq!(report.products.len(), 1000);
    assert_eq!(report.order_ids.len(), 1000);
    assert_eq!(populator.row_count("customers").await?, 1000);
    assert_eq!(populator.row_count("products").await?, 1000);
    assert_eq!(populator.row_count("orders").await?, 1000);

    drop_schema(&populator, &schema).await
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_bulk_orders_reference_existing_rows_with_consistent_totals() -> Result<()> {
    let (mut populator, schema) = isolated_populator(7).await?;

    populator.bulk_insert(200).await?;

    let orphans = populator
        .client()
        .query_one(
            "SELECT COUNT(*) FROM \"orders\" o \
             LEFT JOIN \"customers\" c ON c.\"id\" = o.\"customer_id\" \
             LEFT JOIN \"products\" p ON p.\"id\" = o.\"product_id\" \
             WHERE c.\"id\" IS NULL OR p.\"id\" IS NULL",
            &[],
        )
        .await?;
    assert_eq!(orphans.get::<_, i64>(0), 0);

    let rows = populator
        .client()
        .query(
            "SELECT o.\"quantity\", o.\"total\", p.\"price\" FROM \"orders\" o \
             JOIN \"products\" p ON p.\"id\" = o.\"product_id\"",
            &[],
        )
        .await?;
    for row in rows {
        let quantity: i32 = row.get(0);
        let total: Decimal = row.get(1);
        let price: Decimal = row.get(2);
        assert!((1..=5).contains(&quantity));
        assert_eq!(total, (price * Decimal::from(quantity)).round_dp(2));
    }

    drop_schema(&populator, &schema).await
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_bulk_insert_zero_rows() -> Result<()> {
    let (mut populator, schema) = isolated_populator(1).await?;

    let report = populator.bulk_insert(0).await?;

    assert_eq!(report.rows_inserted(), 0);
    assert_eq!(populator.row_count("orders").await?, 0);

    drop_schema(&populator, &schema).await
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_new_order_on_empty_store_seeds_customer_and_product() -> Result<()> {
    let (mut populator, schema) = isolated_populator(3).await?;

    let outcome = populator.run_operation(Operation::NewOrder).await?;

    assert_eq!(outcome.operation(), Operation::NewOrder);
    assert_eq!(populator.row_count("customers").await?, 1);
    assert_eq!(populator.row_count("products").await?, 1);
    assert_eq!(populator.row_count("orders").await?, 1);

    drop_schema(&populator, &schema).await
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_update_stock_sets_value_in_range() -> Result<()> {
    let (mut populator, schema) = isolated_populator(11).await?;

    // Empty store: the update creates its own product first.
    let outcome = populator.run_operation(Operation::UpdateStock).await?;
    assert_eq!(populator.row_count("products").await?, 1);

    let db_stock: i32 = populator
        .client()
        .query_one("SELECT \"stock\" FROM \"products\"", &[])
        .await?
        .get(0);
    match outcome {
        db_populator::OperationOutcome::StockUpdated { stock, .. } => {
            assert_eq!(stock, db_stock);
            assert!((5..=100).contains(&stock));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    drop_schema(&populator, &schema).await
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_failed_transaction_leaves_no_rows() -> Result<()> {
    init_logging();
    let (mut client, schema) = connect_isolated().await?;
    for ddl in db_populator::schema::create_all_statements() {
        client.batch_execute(ddl).await?;
    }

    let mut rng = StdRng::seed_from_u64(5);
    {
        let tx = client.transaction().await?;
        insert::insert_customer(&tx, &NewCustomer::generate(&mut rng)).await?;
        let product = insert::insert_product(&tx, &NewProduct::generate(&mut rng)).await?;
        let dangling = NewOrder::generate(&mut rng, i32::MAX, product);
        assert!(insert::insert_order(&tx, &dangling).await.is_err());
        // Dropped without commit.
    }

    let populator = Populator::with_client(client, rng)?;
    assert_eq!(populator.row_count("customers").await?, 0);
    assert_eq!(populator.row_count("products").await?, 0);
    assert_eq!(populator.row_count("orders").await?, 0);

    drop_schema(&populator, &schema).await
}

async fn total_rows(populator: &Populator) -> Result<u64> {
    let mut total = 0;
    for table in ["customers", "products", "orders"] {
        total += populator.row_count(table).await?;
    }
    Ok(total)
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_cancelled_bulk_insert_commits_nothing() -> Result<()> {
    let (mut populator, schema) = isolated_populator(13).await?;
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let report = populator.bulk_insert_until_cancelled(500, &shutdown).await?;

    assert!(report.is_none());
    assert_eq!(total_rows(&populator).await?, 0);

    drop_schema(&populator, &schema).await
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_uncancelled_bulk_insert_completes() -> Result<()> {
    let (mut populator, schema) = isolated_populator(17).await?;
    let shutdown = CancellationToken::new();

    let report = populator
        .bulk_insert_until_cancelled(50, &shutdown)
        .await?
        .context("bulk insert was not cancelled")?;

    assert_eq!(report.rows_inserted(), 150);
    assert_eq!(total_rows(&populator).await?, 150);

    drop_schema(&populator, &schema).await
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_simulation_with_cancelled_token_writes_nothing() -> Result<()> {
    let (populator, schema) = isolated_populator(19).await?;
    let mut populator = populator.with_pacing(Pacing {
        min: Duration::from_millis(10),
        max: Duration::from_millis(20),
    });
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let report = populator.run_continuous(shutdown).await?;

    assert_eq!(report.iterations, 0);
    assert_eq!(total_rows(&populator).await?, 0);

    drop_schema(&populator, &schema).await
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL instance"]
async fn test_simulation_stops_when_cancelled() -> Result<()> {
    let (populator, schema) = isolated_populator(23).await?;
    let mut populator = populator.with_pacing(Pacing {
        min: Duration::from_millis(10),
        max: Duration::from_millis(20),
    });
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), populator.run_continuous(shutdown))
        .await
        .context("simulation did not stop after cancellation")??;

    assert!(report.iterations >= 1);
    let counted: u64 = Operation::ALL.iter().map(|op| report.count(*op)).sum();
    assert_eq!(counted, report.iterations);
    assert!(total_rows(&populator).await? >= 1);

    drop_schema(&populator, &schema).await
}
