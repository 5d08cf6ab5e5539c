//! Stream checkpoint manager.

use std::sync::Arc;

use crate::{store::CheckpointStore, Checkpoint, CheckpointFile, StreamMetadata};

/// Number of most recent batch checkpoints kept by default.
pub const DEFAULT_RETAINED_CHECKPOINTS: u64 = 100;

/// Manager for one stream's checkpoint location.
///
/// # Example
///
/// ```rust,ignore
/// use checkpoint::{CheckpointManager, ObjectCheckpointStore};
///
/// let manager = CheckpointManager::open(Arc::new(ObjectCheckpointStore::new(store))).await?;
///
/// // Save a checkpoint
/// manager.emit(0, &offsets).await?;
///
/// // Load the latest one
/// let latest: Option<(u64, PartitionOffsets)> = manager.latest().await?;
/// ```
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    metadata: StreamMetadata,
    retained: u64,
}

impl CheckpointManager {
    /// Open a checkpoint location, assigning a new stream id on first use.
    pub async fn open(store: Arc<dyn CheckpointStore>) -> anyhow::Result<Self> {
        let metadata = match store.read_metadata().await? {
            Some(existing) => {
                tracing::info!("Resuming stream {}", existing.id);
                existing
            }
            None => {
                let metadata = store.create_metadata(&StreamMetadata::generate()).await?;
                tracing::info!("Initialized new stream {}", metadata.id);
                metadata
            }
        };

        Ok(Self {
            store,
            metadata,
            retained: DEFAULT_RETAINED_CHECKPOINTS,
        })
    }

    /// Keep only the `retained` most recent batch checkpoints (at least one).
    pub fn with_retention(mut self, retained: u64) -> Self {
        self.retained = retained.max(1);
        self
    }

    /// Stable identifier of this stream.
    pub fn stream_id(&self) -> &str {
        &self.metadata.id
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    /// Record that `batch_id` completed at `checkpoint`.
    ///
    /// Checkpoints older than the retention window are deleted afterwards.
    /// A failed cleanup is logged and does not fail the emit.
    pub async fn emit<C: Checkpoint>(&self, batch_id: u64, checkpoint: &C) -> anyhow::Result<()> {
        let file = CheckpointFile::new(checkpoint, batch_id)?;
        self.store.store_checkpoint(&file).await?;

        tracing::info!(
            "Emitted checkpoint for batch {}: {}",
            batch_id,
            checkpoint.to_cli_string()
        );

        let keep_from = (batch_id + 1).saturating_sub(self.retained);
        if keep_from > 0 {
            if let Err(e) = self.store.prune_checkpoints(keep_from).await {
                tracing::warn!("Failed to prune checkpoints below batch {keep_from}: {e:#}");
            }
        }

        Ok(())
    }

    /// Read the most recent checkpoint file without interpreting it.
    pub async fn latest_file(&self) -> anyhow::Result<Option<CheckpointFile>> {
        self.store.read_latest_checkpoint().await
    }

    /// Read and parse the most recent checkpoint with its batch id.
    ///
    /// The checkpoint type `C` can be inferred from context:
    ///
    /// ```rust,ignore
    /// let latest: Option<(u64, PartitionOffsets)> = manager.latest().await?;
    /// ```
    pub async fn latest<C: Checkpoint>(&self) -> anyhow::Result<Option<(u64, C)>> {
        match self.latest_file().await? {
            Some(file) => Ok(Some((file.batch_id, file.parse::<C>()?))),
            None => Ok(None),
        }
    }
}
