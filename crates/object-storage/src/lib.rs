//! Object store abstraction for table data, commit logs and checkpoints.
//!
//! Keys are `/`-separated strings relative to the store root. Two backends
//! are provided:
//!
//! - `S3Store` - an S3-compatible bucket (AWS S3, MinIO) with path-style addressing
//! - `LocalStore` - a directory on the local filesystem
//!
//! `Scoped` narrows any store to a key prefix, which is how the table and the
//! checkpoint location share one bucket.
//!
//! Both backends support create-only writes (`put_if_absent`), which the
//! commit log relies on for mutual exclusion between writers.

mod error;
mod local;
mod s3;
mod scoped;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::StorageError;
pub use local::LocalStore;
pub use s3::{BucketStatus, S3Config, S3Store};
pub use scoped::Scoped;

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Outcome of a create-only write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The object did not exist and has been written.
    Created,
    /// An object already exists at the key; nothing was written.
    AlreadyExists,
}

/// Minimal object storage contract.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing one.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Write an object only if no object exists at `key`.
    ///
    /// An existing object is a normal outcome, not an error.
    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<PutOutcome>;

    /// Read an object. Returns `None` when it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// List keys starting with `prefix`, sorted ascending.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Join two key segments with exactly one `/` between them.
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else if key.is_empty() {
        format!("{prefix}/")
    } else {
        format!("{prefix}/{key}")
    }
}
