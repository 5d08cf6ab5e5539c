//! Synthetic load generator for the customers/products/orders schema.
//!
//! Two entry modes share one connection and one random source:
//! - bulk: insert N rows per table in a single transaction and exit
//! - continuous: run weighted random operations, one transaction each,
//!   until cancelled
//!
//! Each committed write becomes a change event downstream, so every unit of
//! work here is atomic.

mod args;
mod config;
mod error;
pub mod fake;
pub mod insert;
mod models;
mod populator;
pub mod schema;

pub use args::{PopulateArgs, RunMode};
pub use config::{DbConfig, DB_HOST, DB_NAME, DB_PASSWORD, DB_PORT, DB_USER};
pub use error::PopulatorError;
pub use models::{
    order_total, NewCustomer, NewOrder, NewProduct, Operation, OperationSampler, ProductPrice,
    StockUpdate,
};
pub use populator::{
    generate_orders, BulkInsertReport, OperationOutcome, Pacing, Populator, SimulationReport,
};
