//! Append-only Delta Lake writer.
//!
//! Writes Parquet data files and newline-delimited JSON commits under
//! `_delta_log/` through an [`object_storage::ObjectStore`]. Commits are
//! created with a create-only write, so two writers racing for the same
//! version cannot both succeed.
//!
//! Only blind appends are supported: no partitioning, no deletes, no log
//! checkpoints and no schema evolution.

mod data_file;
mod error;
mod protocol;
mod schema;
mod table;

pub use data_file::{decode_parquet, encode_parquet};
pub use error::{DeltaError, Result};
pub use protocol::{commit_key, decode_commit, Action, Add, FileStats, LogLine, Txn, LOG_DIR};
pub use schema::{delta_type_name, schema_string};
pub use table::{AppTransaction, CommitOutcome, DeltaTable};

/// Writer identification recorded in commits and Parquet footers.
pub const ENGINE_INFO: &str = concat!("cdc-demo-delta-sink/", env!("CARGO_PKG_VERSION"));
