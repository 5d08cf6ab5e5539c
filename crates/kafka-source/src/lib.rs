//! Kafka consumer library for the change materializer.
//!
//! Features:
//!
//! - Manual partition assignment: no consumer-group rebalancing and no offset
//!   commits to the broker; positions are owned by the caller's checkpoint
//! - Start positions resolved from a checkpoint, falling back to the
//!   partition's high watermark
//! - Bounded micro-batch polling (message count and wait time)

/// Low-level consumer with explicit positions
pub mod consumer;
pub mod error;

/// Partition offsets checkpoint and start position resolution
pub mod offsets;

// Re-export main types for easy access
pub use consumer::{Consumer, ConsumerConfig, Message};
pub use error::{Error, Result};
pub use offsets::{resolve_start_positions, PartitionOffsets};
