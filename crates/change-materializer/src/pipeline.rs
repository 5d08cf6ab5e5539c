//! Micro-batch loop from the change topic to the Delta table.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use checkpoint::{CheckpointManager, ObjectCheckpointStore};
use delta_sink::{AppTransaction, DeltaTable};
use kafka_source::{resolve_start_positions, Consumer, Message, PartitionOffsets};
use object_storage::{BucketStatus, ObjectStore, S3Store, Scoped};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::{product_schema, rows_to_batch};
use crate::config::MaterializerConfig;
use crate::envelope::{decode, DropReason};
use crate::error::{MaterializerError, Result};

/// How often to look for the topic before it has been created.
const TOPIC_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// What one micro-batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Batch id, `None` when nothing was consumed.
    pub batch_id: Option<u64>,
    pub messages: usize,
    pub rows: usize,
    pub dropped: BTreeMap<String, usize>,
    /// Delta version created by the batch, if it had rows.
    pub table_version: Option<i64>,
}

/// Totals over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: u64,
    pub messages: u64,
    pub rows: u64,
}

impl RunSummary {
    fn record(&mut self, report: &BatchReport) {
        if report.batch_id.is_some() {
            self.batches += 1;
        }
        self.messages += report.messages as u64;
        self.rows += report.rows as u64;
    }
}

/// Writes decoded micro-batches to the table and records progress.
///
/// Each batch is committed to the table before its checkpoint is written, so
/// a crash in between replays the batch on restart.
pub struct BatchWriter {
    table: DeltaTable,
    checkpoints: CheckpointManager,
    next_batch_id: u64,
}

impl BatchWriter {
    /// Open the table and checkpoint, and work out the next batch id.
    pub async fn open(
        table_store: Arc<dyn ObjectStore>,
        checkpoint_store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        let checkpoints =
            CheckpointManager::open(Arc::new(ObjectCheckpointStore::new(checkpoint_store)))
                .await
                .map_err(MaterializerError::checkpoint)?;
        let table = DeltaTable::open(table_store, product_schema()).await?;

        let last_checkpointed = checkpoints
            .latest_file()
            .await
            .map_err(MaterializerError::checkpoint)?
            .map(|file| file.batch_id());
        let last_committed = table
            .app_transaction_version(checkpoints.stream_id())
            .and_then(|v| u64::try_from(v).ok());
        let next_batch_id = next_batch_id(last_checkpointed, last_committed);

        info!(
            "Stream {} resumes at batch {} (table version {})",
            checkpoints.stream_id(),
            next_batch_id,
            table.version()
        );

        Ok(Self {
            table,
            checkpoints,
            next_batch_id,
        })
    }

    pub fn stream_id(&self) -> &str {
        self.checkpoints.stream_id()
    }

    pub fn next_batch_id(&self) -> u64 {
        self.next_batch_id
    }

    pub fn table(&self) -> &DeltaTable {
        &self.table
    }

    /// Source positions recorded by the latest checkpoint.
    pub async fn checkpointed_positions(&self) -> Result<Option<PartitionOffsets>> {
        let latest = self
            .checkpoints
            .latest::<PartitionOffsets>()
            .await
            .map_err(MaterializerError::checkpoint)?;
        Ok(latest.map(|(_, positions)| positions))
    }

    /// Materialize one poll's messages. `positions` are the source positions
    /// after the last of them.
    ///
    /// A poll that returned no messages writes nothing.
    pub async fn process(
        &mut self,
        messages: &[Message],
        positions: &PartitionOffsets,
    ) -> Result<BatchReport> {
        if messages.is_empty() {
            return Ok(BatchReport::default());
        }

        let batch_id = self.next_batch_id;
        let mut report = BatchReport {
            batch_id: Some(batch_id),
            messages: messages.len(),
            ..Default::default()
        };

        let mut rows = Vec::with_capacity(messages.len());
        for message in messages {
            match decode(message.payload.as_deref()) {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    if reason == DropReason::Malformed {
                        debug!(
                            "Dropping malformed event at {}/{}@{}",
                            message.topic, message.partition, message.offset
                        );
                    }
                    *report.dropped.entry(reason.to_string()).or_default() += 1;
                }
            }
        }

        if !report.dropped.is_empty() {
            warn!("Batch {} dropped events: {:?}", batch_id, report.dropped);
        }

        if !rows.is_empty() {
            let batch = rows_to_batch(&rows)?;
            let txn = AppTransaction::new(self.stream_id(), batch_id as i64);
            let outcome = self.table.append(&batch, Some(txn)).await?;
            report.rows = outcome.records;
            report.table_version = Some(outcome.version);
        }

        self.checkpoints
            .emit(batch_id, positions)
            .await
            .map_err(MaterializerError::checkpoint)?;
        self.next_batch_id = batch_id + 1;

        info!(
            "Batch {}: {} message(s), {} row(s) appended",
            batch_id, report.messages, report.rows
        );
        Ok(report)
    }
}

/// Batch id following everything already checkpointed or committed.
pub fn next_batch_id(last_checkpointed: Option<u64>, last_committed: Option<u64>) -> u64 {
    match last_checkpointed.max(last_committed) {
        Some(last) => last + 1,
        None => 0,
    }
}

/// Change Event Materializer.
pub struct Materializer {
    config: MaterializerConfig,
}

impl Materializer {
    pub fn new(config: MaterializerConfig) -> Self {
        Self { config }
    }

    /// Provision storage, resume from the checkpoint, and run micro-batches
    /// until `shutdown` is cancelled.
    ///
    /// Cancellation during startup returns an empty summary.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<RunSummary> {
        let config = &self.config;
        let mut summary = RunSummary::default();

        let started = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            started = self.start(&shutdown) => started?,
        };
        let Some((mut writer, mut consumer)) = started else {
            info!("Materializer stopped before consuming");
            return Ok(summary);
        };

        info!(
            "Materializing '{}' into s3://{}/{}",
            config.topic, config.bucket, config.table_path
        );

        while !shutdown.is_cancelled() {
            let messages = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = consumer.poll_batch(config.max_batch_size, config.trigger_interval()) => polled?,
            };
            let report = writer.process(&messages, consumer.positions()).await?;
            summary.record(&report);
        }

        info!(
            "Materializer stopped after {} batch(es), {} message(s), {} row(s)",
            summary.batches, summary.messages, summary.rows
        );
        Ok(summary)
    }

    /// Everything before the first poll: bucket, table, checkpoint, partition
    /// discovery and assignment. `None` when the topic wait was cancelled.
    async fn start(&self, shutdown: &CancellationToken) -> Result<Option<(BatchWriter, Consumer)>> {
        let config = &self.config;

        let s3 = S3Store::connect(&config.s3_config()).await;
        match s3.ensure_bucket(&config.s3_region).await? {
            BucketStatus::Created => info!("Created bucket '{}'", config.bucket),
            BucketStatus::AlreadyExists => info!("Bucket '{}' already exists", config.bucket),
        }

        let root: Arc<dyn ObjectStore> = Arc::new(s3);
        let table_store: Arc<dyn ObjectStore> =
            Arc::new(Scoped::new(Arc::clone(&root), config.table_path.clone()));
        let checkpoint_store: Arc<dyn ObjectStore> =
            Arc::new(Scoped::new(root, config.checkpoint_path.clone()));
        let mut writer = BatchWriter::open(table_store, checkpoint_store).await?;

        let mut consumer = Consumer::new(config.consumer_config())?;
        let Some(partitions) = consumer
            .wait_for_partitions(TOPIC_RETRY_INTERVAL, shutdown)
            .await?
        else {
            return Ok(None);
        };
        let watermarks = consumer.high_watermarks(&partitions).await?;
        let checkpointed = writer.checkpointed_positions().await?;
        let start = resolve_start_positions(
            consumer.topic(),
            &partitions,
            checkpointed.as_ref(),
            &watermarks,
        );
        consumer.assign(&start)?;

        Ok(Some((writer, consumer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_sink::{commit_key, decode_commit, decode_parquet};
    use object_storage::LocalStore;
    use tempfile::TempDir;

    const TOPIC: &str = "postgres-db.public.products";

    struct Stores {
        _dir: TempDir,
        table: Arc<dyn ObjectStore>,
        checkpoints: Arc<dyn ObjectStore>,
    }

    fn stores() -> Stores {
        let dir = TempDir::new().unwrap();
        let root: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        Stores {
            table: Arc::new(Scoped::new(Arc::clone(&root), "products_delta")),
            checkpoints: Arc::new(Scoped::new(root, "_checkpoints/products_console")),
            _dir: dir,
        }
    }

    fn message(offset: i64, payload: Option<&str>) -> Message {
        Message {
            payload: payload.map(|p| p.as_bytes().to_vec()),
            topic: TOPIC.to_string(),
            partition: 0,
            offset,
            key: None,
            timestamp: None,
        }
    }

    fn create(id: i32) -> String {
        format!(
            r#"{{"payload":{{"before":null,"after":{{"id":{id},"name":"p{id}","price":"9.50"}},"op":"c","ts_ms":"1"}}}}"#
        )
    }

    fn positions(next: i64) -> PartitionOffsets {
        let mut p = PartitionOffsets::new(TOPIC);
        p.set(0, next);
        p
    }

    #[tokio::test]
    async fn test_batch_appends_surviving_rows() {
        let stores = stores();
        let mut writer = BatchWriter::open(stores.table.clone(), stores.checkpoints.clone())
            .await
            .unwrap();
        assert_eq!(writer.next_batch_id(), 0);

        let delete = r#"{"payload":{"before":{"id":1},"after":null,"op":"d"}}"#;
        let messages = vec![
            message(0, Some(&create(1))),
            message(1, Some("{broken")),
            message(2, Some(delete)),
            message(3, None),
            message(4, Some(&create(2))),
        ];
        let report = writer.process(&messages, &positions(5)).await.unwrap();

        assert_eq!(report.batch_id, Some(0));
        assert_eq!(report.messages, 5);
        assert_eq!(report.rows, 2);
        assert_eq!(report.table_version, Some(0));
        assert_eq!(report.dropped["malformed"], 1);
        assert_eq!(report.dropped["no after image"], 1);
        assert_eq!(report.dropped["tombstone"], 1);

        let commit = stores.table.get(&commit_key(0)).await.unwrap().unwrap();
        let lines = decode_commit(&commit).unwrap();
        let add = lines.iter().find_map(|l| l.add.clone()).unwrap();
        let txn = lines.iter().find_map(|l| l.txn.clone()).unwrap();
        assert_eq!(txn.app_id, writer.stream_id());
        assert_eq!(txn.version, 0);

        let data = stores.table.get(&add.path).await.unwrap().unwrap();
        let batches = decode_parquet(data).unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);

        assert_eq!(
            writer.checkpointed_positions().await.unwrap(),
            Some(positions(5))
        );
    }

    #[tokio::test]
    async fn test_batch_without_rows_still_checkpoints() {
        let stores = stores();
        let mut writer = BatchWriter::open(stores.table.clone(), stores.checkpoints.clone())
            .await
            .unwrap();

        let messages = vec![message(0, Some("not json")), message(1, None)];
        let report = writer.process(&messages, &positions(2)).await.unwrap();
        assert_eq!(report.batch_id, Some(0));
        assert_eq!(report.rows, 0);
        assert_eq!(report.table_version, None);
        assert_eq!(writer.table().version(), -1);
        assert_eq!(writer.next_batch_id(), 1);
        assert_eq!(
            writer.checkpointed_positions().await.unwrap(),
            Some(positions(2))
        );
    }

    #[tokio::test]
    async fn test_empty_poll_writes_nothing() {
        let stores = stores();
        let mut writer = BatchWriter::open(stores.table.clone(), stores.checkpoints.clone())
            .await
            .unwrap();

        let report = writer.process(&[], &positions(0)).await.unwrap();
        assert_eq!(report, BatchReport::default());
        assert_eq!(writer.next_batch_id(), 0);
        assert!(writer.checkpointed_positions().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restart_resumes_after_last_batch() {
        let stores = stores();
        let stream_id = {
            let mut writer = BatchWriter::open(stores.table.clone(), stores.checkpoints.clone())
                .await
                .unwrap();
            writer
                .process(&[message(0, Some(&create(1)))], &positions(1))
                .await
                .unwrap();
            writer
                .process(&[message(1, Some(&create(2)))], &positions(2))
                .await
                .unwrap();
            writer.stream_id().to_string()
        };

        let mut writer = BatchWriter::open(stores.table.clone(), stores.checkpoints.clone())
            .await
            .unwrap();
        assert_eq!(writer.stream_id(), stream_id);
        assert_eq!(writer.next_batch_id(), 2);
        assert_eq!(writer.table().version(), 1);

        let report = writer
            .process(&[message(2, Some(&create(3)))], &positions(3))
            .await
            .unwrap();
        assert_eq!(report.batch_id, Some(2));
        assert_eq!(report.table_version, Some(2));
    }

    #[tokio::test]
    async fn test_run_cancelled_during_startup_stops_cleanly() {
        #[derive(clap::Parser)]
        struct TestCli {
            #[command(flatten)]
            config: MaterializerConfig,
        }
        let config = <TestCli as clap::Parser>::try_parse_from(["materialize"])
            .unwrap()
            .config;
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            Materializer::new(config).run(shutdown),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn test_next_batch_id() {
        assert_eq!(next_batch_id(None, None), 0);
        assert_eq!(next_batch_id(Some(4), None), 5);
        assert_eq!(next_batch_id(None, Some(2)), 3);
        assert_eq!(next_batch_id(Some(4), Some(5)), 6);
        assert_eq!(next_batch_id(Some(7), Some(5)), 8);
    }
}
