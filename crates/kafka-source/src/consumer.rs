use crate::error::{Error, Result};
use crate::offsets::PartitionOffsets;
use checkpoint::Checkpoint;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer as RdkafkaConsumer, StreamConsumer as RdkafkaStreamConsumer};
use rdkafka::message::{BorrowedMessage as RdkafkaBorrowedMessage, Message as RdkafkaMessage};
use rdkafka::{Offset, TopicPartitionList};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for Kafka consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Consumer group ID
    ///
    /// librdkafka requires one, but partitions are assigned manually and no
    /// offsets are ever committed under it.
    pub group_id: String,
    /// Topic to consume from
    pub topic: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: String,
    /// Timeout for metadata and watermark requests
    pub metadata_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "cdc-demo-consumer".to_string(),
            topic: "".to_string(),
            session_timeout_ms: "6000".to_string(),
            metadata_timeout: Duration::from_secs(10),
        }
    }
}

/// A Kafka message copied out of the client's buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw message value; `None` for tombstones
    pub payload: Option<Vec<u8>>,
    /// Kafka topic
    pub topic: String,
    /// Kafka partition
    pub partition: i32,
    /// Kafka offset
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Message timestamp (milliseconds since epoch)
    pub timestamp: Option<i64>,
}

impl Message {
    fn from_borrowed(msg: &RdkafkaBorrowedMessage) -> Self {
        Self {
            payload: msg.payload().map(|p| p.to_vec()),
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(|k| k.to_vec()),
            timestamp: msg.timestamp().to_millis(),
        }
    }
}

/// Kafka consumer reading one topic from explicit positions.
///
/// Tracks the next offset of every assigned partition as messages are
/// polled; callers persist [`Consumer::positions`] in their own checkpoint.
pub struct Consumer {
    consumer: Arc<RdkafkaStreamConsumer>,
    config: ConsumerConfig,
    positions: PartitionOffsets,
}

impl Consumer {
    /// Create a new Kafka consumer. Nothing is assigned until [`Consumer::assign`].
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        if config.topic.is_empty() {
            return Err(Error::InvalidConfig("topic must not be empty".to_string()));
        }

        let consumer: RdkafkaStreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "latest")
            .set("session.timeout.ms", &config.session_timeout_ms)
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| Error::Consumer(format!("Failed to create consumer: {e}")))?;

        let positions = PartitionOffsets::new(config.topic.clone());
        Ok(Self {
            consumer: Arc::new(consumer),
            config,
            positions,
        })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Partition ids of the topic; empty while the topic does not exist.
    pub async fn partitions(&self) -> Result<Vec<i32>> {
        let consumer = Arc::clone(&self.consumer);
        let topic = self.config.topic.clone();
        let timeout = self.config.metadata_timeout;

        tokio::task::spawn_blocking(move || -> Result<Vec<i32>> {
            let metadata = consumer.fetch_metadata(Some(&topic), timeout)?;
            let mut ids: Vec<i32> = metadata
                .topics()
                .iter()
                .filter(|t| t.name() == topic && t.error().is_none())
                .flat_map(|t| t.partitions().iter().map(|p| p.id()))
                .collect();
            ids.sort_unstable();
            Ok(ids)
        })
        .await?
    }

    /// Poll the topic's metadata until it has partitions.
    ///
    /// Returns `None` if `shutdown` is cancelled first.
    pub async fn wait_for_partitions(
        &self,
        retry_interval: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Option<Vec<i32>>> {
        loop {
            let partitions = self.partitions().await?;
            if !partitions.is_empty() {
                info!(
                    "Topic '{}' has {} partition(s)",
                    self.config.topic,
                    partitions.len()
                );
                return Ok(Some(partitions));
            }

            info!(
                "Waiting for topic '{}' to be created...",
                self.config.topic
            );
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(None),
                _ = tokio::time::sleep(retry_interval) => {}
            }
        }
    }

    /// High watermark (offset of the next message to be produced) per partition.
    pub async fn high_watermarks(&self, partitions: &[i32]) -> Result<BTreeMap<i32, i64>> {
        let consumer = Arc::clone(&self.consumer);
        let topic = self.config.topic.clone();
        let timeout = self.config.metadata_timeout;
        let partitions = partitions.to_vec();

        tokio::task::spawn_blocking(move || -> Result<BTreeMap<i32, i64>> {
            let mut watermarks = BTreeMap::new();
            for partition in partitions {
                let (_low, high) = consumer.fetch_watermarks(&topic, partition, timeout)?;
                watermarks.insert(partition, high);
            }
            Ok(watermarks)
        })
        .await?
    }

    /// Assign partitions at the given positions, replacing any previous assignment.
    pub fn assign(&mut self, positions: &PartitionOffsets) -> Result<()> {
        if positions.topic != self.config.topic {
            return Err(Error::InvalidConfig(format!(
                "cannot assign positions for topic '{}' to a consumer of '{}'",
                positions.topic, self.config.topic
            )));
        }

        let mut tpl = TopicPartitionList::new();
        for (&partition, &offset) in &positions.partitions {
            tpl.add_partition_offset(&positions.topic, partition, Offset::Offset(offset))
                .map_err(|e| Error::Consumer(format!("Failed to add partition offset: {e}")))?;
        }

        self.consumer
            .assign(&tpl)
            .map_err(|e| Error::Consumer(format!("Failed to assign partitions: {e}")))?;
        self.positions = positions.clone();

        info!("Assigned {}", positions.to_cli_string());
        Ok(())
    }

    /// Receive up to `max_count` messages, waiting at most `max_wait` in total.
    ///
    /// Returns an empty batch if nothing arrives in time.
    pub async fn poll_batch(&mut self, max_count: usize, max_wait: Duration) -> Result<Vec<Message>> {
        let deadline = Instant::now() + max_wait;
        let mut messages = Vec::new();

        while messages.len() < max_count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, self.consumer.recv()).await {
                Ok(Ok(msg)) => {
                    let message = Message::from_borrowed(&msg);
                    self.positions.advance(message.partition, message.offset);
                    messages.push(message);
                }
                Ok(Err(e)) => return Err(Error::Consumer(format!("Error receiving message: {e}"))),
                Err(_) => break, // Timeout, no more messages available right now
            }
        }

        if !messages.is_empty() {
            debug!("Polled {} message(s) from {}", messages.len(), self.config.topic);
        }
        Ok(messages)
    }

    /// Next offset of every assigned partition after the messages polled so far.
    pub fn positions(&self) -> &PartitionOffsets {
        &self.positions
    }
}
