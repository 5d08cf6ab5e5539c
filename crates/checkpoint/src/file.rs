//! Checkpoint file wrapper for storage-agnostic serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Checkpoint;

/// Storage-agnostic checkpoint file wrapper.
///
/// Wraps a source-specific checkpoint with the batch it completes.
///
/// # File Format
///
/// ```json
/// {
///     "source_type": "kafka",
///     "checkpoint": {
///         "topic": "postgres-db.public.products",
///         "partitions": { "0": 42 }
///     },
///     "batch_id": 7,
///     "created_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Source type identifier (e.g., "kafka")
    pub source_type: String,
    /// Serialized checkpoint data as JSON Value
    pub checkpoint: serde_json::Value,
    /// Batch whose completion this checkpoint records
    pub batch_id: u64,
    /// Timestamp when this checkpoint file was created
    pub created_at: DateTime<Utc>,
}

impl CheckpointFile {
    /// Create new checkpoint file from a source-specific checkpoint.
    pub fn new<C: Checkpoint>(checkpoint: &C, batch_id: u64) -> anyhow::Result<Self> {
        Ok(Self {
            source_type: C::SOURCE_TYPE.to_string(),
            checkpoint: serde_json::to_value(checkpoint)?,
            batch_id,
            created_at: Utc::now(),
        })
    }

    /// Parse checkpoint into a source-specific type.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The `source_type` doesn't match `C::SOURCE_TYPE`
    /// - The checkpoint data can't be deserialized into type `C`
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.source_type != C::SOURCE_TYPE {
            anyhow::bail!(
                "Checkpoint type mismatch: expected '{}', found '{}'",
                C::SOURCE_TYPE,
                self.source_type
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
