use checkpoint::Checkpoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Next offset to read for every partition of one topic.
///
/// This is the Kafka source's checkpoint: after a batch completes, each
/// entry is the offset of the first message not yet processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOffsets {
    pub topic: String,
    pub partitions: BTreeMap<i32, i64>,
}

impl PartitionOffsets {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partitions: BTreeMap::new(),
        }
    }

    /// Next offset for `partition`, if tracked.
    pub fn get(&self, partition: i32) -> Option<i64> {
        self.partitions.get(&partition).copied()
    }

    pub fn set(&mut self, partition: i32, next_offset: i64) {
        self.partitions.insert(partition, next_offset);
    }

    /// Record that the message at `offset` has been consumed.
    pub fn advance(&mut self, partition: i32, offset: i64) {
        let next = offset + 1;
        let entry = self.partitions.entry(partition).or_insert(next);
        if *entry < next {
            *entry = next;
        }
    }
}

impl Checkpoint for PartitionOffsets {
    const SOURCE_TYPE: &'static str = "kafka";

    /// Format: `topic@partition=offset,partition=offset`
    fn to_cli_string(&self) -> String {
        let positions = self
            .partitions
            .iter()
            .map(|(p, o)| format!("{p}={o}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}@{}", self.topic, positions)
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let (topic, positions) = s
            .rsplit_once('@')
            .ok_or_else(|| anyhow::anyhow!("Invalid Kafka checkpoint '{s}': expected topic@p=o,..."))?;
        if topic.is_empty() {
            anyhow::bail!("Invalid Kafka checkpoint '{s}': empty topic");
        }

        let mut offsets = Self::new(topic);
        for part in positions.split(',').filter(|p| !p.is_empty()) {
            let (partition, offset) = part
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Invalid partition position '{part}'"))?;
            offsets.set(partition.trim().parse()?, offset.trim().parse()?);
        }
        Ok(offsets)
    }
}

/// Decide where each partition starts reading.
///
/// Partitions recorded in `checkpoint` resume at their recorded offset; any
/// other partition starts at its high watermark, so events produced before
/// the first start are not replayed. A checkpoint for a different topic is
/// ignored.
pub fn resolve_start_positions(
    topic: &str,
    partitions: &[i32],
    checkpoint: Option<&PartitionOffsets>,
    high_watermarks: &BTreeMap<i32, i64>,
) -> PartitionOffsets {
    let checkpoint = checkpoint.filter(|c| {
        let same_topic = c.topic == topic;
        if !same_topic {
            tracing::warn!(
                "Ignoring checkpoint for topic '{}' while reading '{}'",
                c.topic,
                topic
            );
        }
        same_topic
    });

    let mut positions = PartitionOffsets::new(topic);
    for &partition in partitions {
        let start = checkpoint
            .and_then(|c| c.get(partition))
            .or_else(|| high_watermarks.get(&partition).copied())
            .unwrap_or(0);
        positions.set(partition, start);
    }
    positions
}
