//! PostgreSQL load generator: bulk population and continuous simulation.

use crate::config::DbConfig;
use crate::error::PopulatorError;
use crate::insert;
use crate::models::{
    NewCustomer, NewOrder, NewProduct, Operation, OperationSampler, ProductPrice, StockUpdate,
};
use crate::schema;
use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio_postgres::{Client, NoTls, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Bounds of the random pause between simulation iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(10),
            max: Duration::from_secs(11),
        }
    }
}

impl Pacing {
    /// Draw a pause uniformly from `[min, max]`.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rng.random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Metrics from a bulk insert.
#[derive(Debug, Clone, Default)]
pub struct BulkInsertReport {
    pub customer_ids: Vec<i32>,
    pub products: Vec<ProductPrice>,
    pub order_ids: Vec<i32>,
    pub total_duration: Duration,
}

impl BulkInsertReport {
    /// Rows inserted across the three tables.
    pub fn rows_inserted(&self) -> usize {
        self.customer_ids.len() + self.products.len() + self.order_ids.len()
    }

    /// Calculate rows per second.
    pub fn rows_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.rows_inserted() as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// What one simulation iteration wrote.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    CustomerAdded {
        id: i32,
        name: String,
    },
    ProductAdded {
        id: i32,
        name: String,
    },
    OrderPlaced {
        id: i32,
        customer_id: i32,
        product_id: i32,
        quantity: i32,
        total: Decimal,
    },
    StockUpdated {
        product_id: i32,
        stock: i32,
    },
}

impl OperationOutcome {
    pub fn operation(&self) -> Operation {
        match self {
            OperationOutcome::CustomerAdded { .. } => Operation::NewCustomer,
            OperationOutcome::ProductAdded { .. } => Operation::NewProduct,
            OperationOutcome::OrderPlaced { .. } => Operation::NewOrder,
            OperationOutcome::StockUpdated { .. } => Operation::UpdateStock,
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationOutcome::CustomerAdded { name, .. } => {
                write!(f, "New customer added: {name}")
            }
            OperationOutcome::ProductAdded { name, .. } => {
                write!(f, "New product added: {name}")
            }
            OperationOutcome::OrderPlaced { total, .. } => write!(f, "New order placed: ${total}"),
            OperationOutcome::StockUpdated { product_id, stock } => {
                write!(f, "Product stock updated: ID {product_id} -> {stock}")
            }
        }
    }
}

/// Counts of completed simulation iterations.
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub iterations: u64,
    pub per_operation: HashMap<Operation, u64>,
}

impl SimulationReport {
    fn record(&mut self, operation: Operation) {
        self.iterations += 1;
        *self.per_operation.entry(operation).or_default() += 1;
    }

    /// Iterations completed for `operation`.
    pub fn count(&self, operation: Operation) -> u64 {
        self.per_operation.get(&operation).copied().unwrap_or(0)
    }

    /// Per-operation counts in sampling order, e.g. `new_customer=2, new_product=0, ...`.
    pub fn breakdown(&self) -> String {
        Operation::ALL
            .iter()
            .map(|op| format!("{op}={}", self.count(*op)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Load generator bound to one PostgreSQL connection.
pub struct Populator {
    client: Client,
    rng: StdRng,
    sampler: OperationSampler,
    pacing: Pacing,
}

impl Populator {
    /// Connect to PostgreSQL and create a populator with an OS-seeded RNG.
    pub async fn connect(config: &DbConfig) -> Result<Self, PopulatorError> {
        info!(
            "Connecting to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.dbname
        );
        let (client, connection) = config.to_pg_config().connect(NoTls).await?;

        // Spawn the connection task
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        // Test connection
        client.simple_query("SELECT 1").await?;

        Self::with_client(client, StdRng::from_os_rng())
    }

    /// Create a populator with an existing client and random source.
    pub fn with_client(client: Client, rng: StdRng) -> Result<Self, PopulatorError> {
        Ok(Self {
            client,
            rng,
            sampler: OperationSampler::new()?,
            pacing: Pacing::default(),
        })
    }

    /// Set the pause bounds between simulation iterations.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Get the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Create the customers, products and orders tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), PopulatorError> {
        for ddl in schema::create_all_statements() {
            debug!("DDL: {}", ddl);
            self.client.batch_execute(ddl).await?;
        }
        info!("Schema ready: {}", schema::TABLES.join(", "));
        Ok(())
    }

    /// Get the row count for a table.
    pub async fn row_count(&self, table_name: &str) -> Result<u64, PopulatorError> {
        let sql = format!("SELECT COUNT(*) FROM \"{table_name}\"");
        let row = self.client.query_one(&sql, &[]).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as u64)
    }

    /// Insert `count` customers, products and orders in a single transaction.
    ///
    /// Orders reference only the customers and products created by this call.
    /// Any failure rolls back the whole batch.
    pub async fn bulk_insert(&mut self, count: usize) -> Result<BulkInsertReport, PopulatorError> {
        let start_time = Instant::now();
        println!("Starting bulk insert of {count} rows for each table...");

        let tx = self.client.transaction().await?;

        let customers: Vec<NewCustomer> = (0..count)
            .map(|_| NewCustomer::generate(&mut self.rng))
            .collect();
        let products: Vec<NewProduct> = (0..count)
            .map(|_| NewProduct::generate(&mut self.rng))
            .collect();

        let customer_ids = insert::insert_customers(&tx, &customers).await?;
        println!("Inserted {count} customers");

        let stored_products = insert::insert_products(&tx, &products).await?;
        println!("Inserted {count} products");

        let orders = generate_orders(&mut self.rng, count, &customer_ids, &stored_products)?;
        let order_ids = insert::insert_orders(&tx, &orders).await?;
        println!("Inserted {count} orders");

        tx.commit().await?;
        println!("Bulk insert completed!");

        let report = BulkInsertReport {
            customer_ids,
            products: stored_products,
            order_ids,
            total_duration: start_time.elapsed(),
        };
        info!(
            "Bulk insert complete: {} rows in {:?} ({:.2} rows/sec)",
            report.rows_inserted(),
            report.total_duration,
            report.rows_per_second()
        );
        Ok(report)
    }

    /// Run `bulk_insert` unless `shutdown` fires first.
    ///
    /// Returns `None` when interrupted. The open transaction is dropped
    /// uncommitted, which rolls it back.
    pub async fn bulk_insert_until_cancelled(
        &mut self,
        count: usize,
        shutdown: &CancellationToken,
    ) -> Result<Option<BulkInsertReport>, PopulatorError> {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                println!("\nBulk insert interrupted, transaction rolled back");
                info!("Bulk insert of {} rows per table cancelled", count);
                Ok(None)
            }
            result = self.bulk_insert(count) => result.map(Some),
        }
    }

    /// Execute one operation in its own transaction.
    pub async fn run_operation(
        &mut self,
        operation: Operation,
    ) -> Result<OperationOutcome, PopulatorError> {
        let tx = self.client.transaction().await?;
        let outcome = execute_operation(&tx, &mut self.rng, operation).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Run randomized operations until `shutdown` is cancelled.
    ///
    /// Cancellation is observed between iterations, so an iteration that has
    /// started always commits or fails as a whole.
    pub async fn run_continuous(
        &mut self,
        shutdown: CancellationToken,
    ) -> Result<SimulationReport, PopulatorError> {
        println!("Starting continuous database write simulation...");
        println!("Press Ctrl+C to stop the simulation");

        let mut report = SimulationReport::default();

        while !shutdown.is_cancelled() {
            let operation = self.sampler.sample(&mut self.rng);
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            let outcome = self.run_operation(operation).await?;

            println!("[{timestamp}] {outcome}");
            debug!(operation = %operation, "{}", outcome);
            report.record(operation);

            let pause = self.pacing.sample(&mut self.rng);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        println!("\nSimulation stopped gracefully");
        info!(
            "Simulation stopped after {} iterations ({})",
            report.iterations,
            report.breakdown()
        );
        Ok(report)
    }
}

/// Build `count` orders sampling customers and products with replacement.
pub fn generate_orders<R: Rng>(
    rng: &mut R,
    count: usize,
    customer_ids: &[i32],
    products: &[ProductPrice],
) -> Result<Vec<NewOrder>, PopulatorError> {
    (0..count)
        .map(|_| NewOrder::sample(rng, customer_ids, products))
        .collect()
}

async fn execute_operation(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
    operation: Operation,
) -> Result<OperationOutcome, PopulatorError> {
    match operation {
        Operation::NewCustomer => {
            let customer = NewCustomer::generate(rng);
            let id = insert::insert_customer(tx, &customer).await?;
            Ok(OperationOutcome::CustomerAdded {
                id,
                name: customer.name,
            })
        }
        Operation::NewProduct => {
            let product = NewProduct::generate(rng);
            let stored = insert::insert_product(tx, &product).await?;
            Ok(OperationOutcome::ProductAdded {
                id: stored.id,
                name: product.name,
            })
        }
        Operation::NewOrder => {
            let order = prepare_order(tx, rng).await?;
            let id = insert::insert_order(tx, &order).await?;
            Ok(OperationOutcome::OrderPlaced {
                id,
                customer_id: order.customer_id,
                product_id: order.product_id,
                quantity: order.quantity,
                total: order.total,
            })
        }
        Operation::UpdateStock => {
            let update = prepare_stock_update(tx, rng).await?;
            insert::update_stock(tx, &update).await?;
            Ok(OperationOutcome::StockUpdated {
                product_id: update.product_id,
                stock: update.stock,
            })
        }
    }
}

/// Pick the order's customer and product, inserting one of each first when
/// either table is empty.
async fn prepare_order(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
) -> Result<NewOrder, PopulatorError> {
    let customer_ids = insert::select_customer_ids(tx).await?;
    let products = insert::select_product_prices(tx).await?;

    if customer_ids.is_empty() || products.is_empty() {
        let customer_id = insert::insert_customer(tx, &NewCustomer::generate(rng)).await?;
        let product = insert::insert_product(tx, &NewProduct::generate(rng)).await?;
        debug!(
            "Seeded fallback customer {} and product {} for new order",
            customer_id, product.id
        );
        return Ok(NewOrder::generate(rng, customer_id, product));
    }

    NewOrder::sample(rng, &customer_ids, &products)
}

/// Pick the product to restock, inserting one first when none exist.
async fn prepare_stock_update(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
) -> Result<StockUpdate, PopulatorError> {
    let mut product_ids = insert::select_product_ids(tx).await?;

    if product_ids.is_empty() {
        let product = insert::insert_product(tx, &NewProduct::generate(rng)).await?;
        debug!("Seeded fallback product {} for stock update", product.id);
        product_ids.push(product.id);
    }

    StockUpdate::sample(rng, &product_ids)
}
