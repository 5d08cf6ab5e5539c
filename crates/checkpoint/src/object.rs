//! Object-store-backed checkpoint storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use object_storage::{ObjectStore, PutOutcome};
use std::sync::Arc;

use crate::store::{CheckpointStore, StreamMetadata};
use crate::{batch_id_from_key, offsets_key, CheckpointFile, METADATA_KEY, OFFSETS_PREFIX};

/// Stores checkpoints as JSON objects in an object store.
///
/// The store is expected to be scoped to the checkpoint location.
pub struct ObjectCheckpointStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectCheckpointStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CheckpointStore for ObjectCheckpointStore {
    async fn read_metadata(&self) -> Result<Option<StreamMetadata>> {
        match self.store.get(METADATA_KEY).await? {
            Some(bytes) => {
                let metadata = serde_json::from_slice(&bytes)
                    .context("Failed to parse checkpoint metadata")?;
                Ok(Some(metadata))
            }
            None => Ok(None),
        }
    }

    async fn create_metadata(&self, metadata: &StreamMetadata) -> Result<StreamMetadata> {
        let body = Bytes::from(serde_json::to_vec(metadata)?);
        match self.store.put_if_absent(METADATA_KEY, body).await? {
            PutOutcome::Created => Ok(metadata.clone()),
            PutOutcome::AlreadyExists => self
                .read_metadata()
                .await?
                .context("Checkpoint metadata disappeared after a conflicting create"),
        }
    }

    async fn store_checkpoint(&self, file: &CheckpointFile) -> Result<()> {
        let key = offsets_key(file.batch_id);
        let body = Bytes::from(serde_json::to_vec_pretty(file)?);
        self.store.put(&key, body).await?;
        tracing::debug!("Stored checkpoint {}", key);
        Ok(())
    }

    async fn read_latest_checkpoint(&self) -> Result<Option<CheckpointFile>> {
        let keys = self.store.list(OFFSETS_PREFIX).await?;
        let latest = keys
            .iter()
            .filter_map(|key| batch_id_from_key(key).map(|id| (id, key)))
            .max_by_key(|(id, _)| *id);

        let Some((batch_id, key)) = latest else {
            return Ok(None);
        };

        let bytes = self
            .store
            .get(key)
            .await?
            .with_context(|| format!("Checkpoint {key} listed but not readable"))?;
        let file: CheckpointFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse checkpoint {key}"))?;

        if file.batch_id != batch_id {
            anyhow::bail!(
                "Checkpoint {key} records batch {} but is named for batch {batch_id}",
                file.batch_id
            );
        }
        Ok(Some(file))
    }

    async fn prune_checkpoints(&self, batch_id: u64) -> Result<usize> {
        let keys = self.store.list(OFFSETS_PREFIX).await?;
        let mut removed = 0;
        for key in keys {
            if batch_id_from_key(&key).is_some_and(|id| id < batch_id) {
                self.store.delete(&key).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!("Pruned {} checkpoint(s) below batch {}", removed, batch_id);
        }
        Ok(removed)
    }
}
