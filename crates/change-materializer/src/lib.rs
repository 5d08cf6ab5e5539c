//! Change Event Materializer.
//!
//! Consumes Debezium change envelopes for the `products` table from Kafka and
//! appends the `after` row images to a Delta table in an S3-compatible
//! bucket, one commit per micro-batch. Progress is tracked in a checkpoint
//! stored in the same bucket. Delivery is at-least-once.

mod batch;
mod config;
pub mod envelope;
mod error;
mod pipeline;

pub use batch::{product_schema, rows_to_batch};
pub use config::MaterializerConfig;
pub use envelope::{decode, ChangePayload, DropReason, ProductRow};
pub use error::{MaterializerError, Result};
pub use pipeline::{next_batch_id, BatchReport, BatchWriter, Materializer, RunSummary};
