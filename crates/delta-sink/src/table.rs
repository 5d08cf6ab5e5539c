//! Append-only Delta table handle.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::Array;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::Utc;
use object_storage::{ObjectStore, PutOutcome};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data_file::encode_parquet;
use crate::error::{DeltaError, Result};
use crate::protocol::{
    commit_key, decode_commit, encode_commit, version_from_key, Action, Add, CommitInfo,
    FileStats, Format, Metadata, Protocol, Txn, LOG_DIR,
};
use crate::schema::schema_string;
use crate::ENGINE_INFO;

/// Identifies a streaming write for idempotent replay detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTransaction {
    pub app_id: String,
    pub version: i64,
}

impl AppTransaction {
    pub fn new(app_id: impl Into<String>, version: i64) -> Self {
        Self {
            app_id: app_id.into(),
            version,
        }
    }
}

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Table version created by the commit.
    pub version: i64,
    /// Data file path relative to the table root.
    pub data_file: String,
    /// Rows written.
    pub records: usize,
}

/// A Delta table rooted at the given store.
///
/// The handle caches the replayed log state; [`DeltaTable::refresh`] picks up
/// commits made by other writers.
pub struct DeltaTable {
    store: Arc<dyn ObjectStore>,
    schema: SchemaRef,
    schema_string: String,
    version: i64,
    app_versions: HashMap<String, i64>,
}

impl DeltaTable {
    /// Open the table and replay its log. A table with no commits has version `-1`
    /// and is created by the first append.
    pub async fn open(store: Arc<dyn ObjectStore>, schema: SchemaRef) -> Result<Self> {
        let schema_string = schema_string(&schema)?;
        let mut table = Self {
            store,
            schema,
            schema_string,
            version: -1,
            app_versions: HashMap::new(),
        };
        table.refresh().await?;

        if table.version < 0 {
            info!("Delta table is empty; it will be created on the first commit");
        } else {
            info!("Opened Delta table at version {}", table.version);
        }
        Ok(table)
    }

    /// Latest committed version, `-1` for an empty table.
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Highest `txn.version` committed under `app_id`.
    pub fn app_transaction_version(&self, app_id: &str) -> Option<i64> {
        self.app_versions.get(app_id).copied()
    }

    /// Replay commits newer than the cached version.
    pub async fn refresh(&mut self) -> Result<()> {
        let mut versions: Vec<i64> = self
            .store
            .list(LOG_DIR)
            .await?
            .iter()
            .filter_map(|key| version_from_key(key))
            .filter(|v| *v > self.version)
            .collect();
        versions.sort_unstable();

        for version in versions {
            if version != self.version + 1 {
                return Err(DeltaError::corrupt(format!(
                    "missing commit {} before {}",
                    self.version + 1,
                    version
                )));
            }
            let key = commit_key(version);
            let bytes = self
                .store
                .get(&key)
                .await?
                .ok_or_else(|| DeltaError::corrupt(format!("{key} listed but not readable")))?;
            self.apply_commit(version, &bytes)?;
            self.version = version;
        }
        Ok(())
    }

    fn apply_commit(&mut self, version: i64, bytes: &[u8]) -> Result<()> {
        for line in decode_commit(bytes)? {
            if let Some(meta) = line.meta_data {
                self.check_schema(&meta.schema_string)?;
            }
            if let Some(txn) = line.txn {
                let entry = self.app_versions.entry(txn.app_id).or_insert(txn.version);
                *entry = (*entry).max(txn.version);
            }
        }
        debug!("Replayed Delta commit {}", version);
        Ok(())
    }

    fn check_schema(&self, logged: &str) -> Result<()> {
        let logged: Value = serde_json::from_str(logged)?;
        let expected: Value = serde_json::from_str(&self.schema_string)?;
        if logged != expected {
            return Err(DeltaError::schema_mismatch(format!(
                "table schema {logged} differs from expected {expected}"
            )));
        }
        Ok(())
    }

    /// Append `batch` as one data file and one commit.
    ///
    /// Fails with [`DeltaError::Conflict`] when another writer has already
    /// committed the next version; the handle is left unchanged and the
    /// uploaded data file stays unreferenced.
    pub async fn append(
        &mut self,
        batch: &RecordBatch,
        txn: Option<AppTransaction>,
    ) -> Result<CommitOutcome> {
        if batch.num_rows() == 0 {
            return Err(DeltaError::EmptyBatch);
        }
        if batch.schema().fields() != self.schema.fields() {
            return Err(DeltaError::schema_mismatch(format!(
                "batch schema {:?} differs from table schema {:?}",
                batch.schema().fields(),
                self.schema.fields()
            )));
        }

        let data = encode_parquet(batch)?;
        let size = data.len() as i64;
        let data_file = format!("part-00000-{}-c000.snappy.parquet", Uuid::new_v4());
        self.store.put(&data_file, data).await?;

        let now = Utc::now().timestamp_millis();
        let version = self.version + 1;
        let mut actions = Vec::with_capacity(5);

        if version == 0 {
            actions.push(Action::Protocol(Protocol::default()));
            actions.push(Action::MetaData(Metadata {
                id: Uuid::new_v4().to_string(),
                name: None,
                description: None,
                format: Format::default(),
                schema_string: self.schema_string.clone(),
                partition_columns: Vec::new(),
                configuration: HashMap::new(),
                created_time: Some(now),
            }));
        }

        let stats = FileStats {
            num_records: batch.num_rows() as i64,
            null_count: self
                .schema
                .fields()
                .iter()
                .zip(batch.columns())
                .map(|(field, column)| (field.name().clone(), column.null_count() as i64))
                .collect(),
        };
        actions.push(Action::Add(Add {
            path: data_file.clone(),
            partition_values: HashMap::new(),
            size,
            modification_time: now,
            data_change: true,
            stats: Some(serde_json::to_string(&stats)?),
        }));

        let mut operation_parameters = HashMap::from([
            ("outputMode".to_string(), "Append".to_string()),
            ("epochId".to_string(), "-1".to_string()),
        ]);
        if let Some(txn) = &txn {
            operation_parameters.insert("queryId".to_string(), txn.app_id.clone());
            operation_parameters.insert("epochId".to_string(), txn.version.to_string());
            actions.push(Action::Txn(Txn {
                app_id: txn.app_id.clone(),
                version: txn.version,
                last_updated: Some(now),
            }));
        }
        actions.push(Action::CommitInfo(CommitInfo {
            timestamp: now,
            operation: "STREAMING UPDATE".to_string(),
            operation_parameters,
            is_blind_append: Some(true),
            engine_info: Some(ENGINE_INFO.to_string()),
        }));

        let key = commit_key(version);
        let payload = Bytes::from(encode_commit(&actions)?);
        match self.store.put_if_absent(&key, payload).await? {
            PutOutcome::Created => {}
            PutOutcome::AlreadyExists => return Err(DeltaError::Conflict { version }),
        }

        self.version = version;
        if let Some(txn) = txn {
            let entry = self.app_versions.entry(txn.app_id).or_insert(txn.version);
            *entry = (*entry).max(txn.version);
        }

        debug!(
            "Committed Delta version {} with {} row(s) in {}",
            version,
            batch.num_rows(),
            data_file
        );
        Ok(CommitOutcome {
            version,
            data_file,
            records: batch.num_rows(),
        })
    }
}
