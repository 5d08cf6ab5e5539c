//! Checkpoint storage trait and shared types.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CheckpointFile;

/// Identity of a materialization stream.
///
/// Written once when a checkpoint location is first used and never changed;
/// the id is what table commits record as their application id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl StreamMetadata {
    /// A fresh stream identity with a random UUID.
    pub fn generate() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Trait for checkpoint storage operations.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the stream metadata, if the location has been initialized.
    async fn read_metadata(&self) -> Result<Option<StreamMetadata>>;

    /// Persist `metadata` unless metadata already exists.
    ///
    /// Returns whichever metadata is stored afterwards.
    async fn create_metadata(&self, metadata: &StreamMetadata) -> Result<StreamMetadata>;

    /// Store the checkpoint for one batch.
    async fn store_checkpoint(&self, file: &CheckpointFile) -> Result<()>;

    /// Read the checkpoint with the highest batch id.
    ///
    /// Returns None if no checkpoint exists.
    async fn read_latest_checkpoint(&self) -> Result<Option<CheckpointFile>>;

    /// Delete checkpoints for batches below `batch_id`.
    ///
    /// Returns the number of checkpoints removed.
    async fn prune_checkpoints(&self, batch_id: u64) -> Result<usize>;
}
