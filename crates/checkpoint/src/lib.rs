//! Checkpoint management for the change materializer
//!
//! Provides storage-agnostic checkpoint handling with support for
//! source-specific checkpoint types.
//!
//! # Architecture
//!
//! This crate provides a generic checkpoint system that:
//! - Defines the `Checkpoint` trait for source-specific checkpoint types
//! - Provides `CheckpointFile` wrapper for storage-agnostic serialization
//! - Manages the stream identity and per-batch checkpoints via `CheckpointManager`
//! - Supports storage backends via the `CheckpointStore` trait
//!
//! ## Layout
//!
//! A checkpoint location holds one `metadata` object naming the stream and
//! one `offsets/<batch id>` object per completed batch. The batch id is
//! zero-padded to 20 digits so lexical and numeric order agree.
//!
//! Each source (e.g. Kafka) implements its own checkpoint type with the
//! `Checkpoint` trait.

mod file;
mod manager;
mod object;
pub mod store;


// Re-export file types
pub use file::CheckpointFile;

// Re-export manager types
pub use manager::{CheckpointManager, DEFAULT_RETAINED_CHECKPOINTS};

// Re-export store trait and types
pub use store::{CheckpointStore, StreamMetadata};

// Re-export storage implementations
pub use object::ObjectCheckpointStore;

/// Trait that source-specific checkpoints must implement.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct MySourceCheckpoint {
///     pub position: i64,
/// }
///
/// impl Checkpoint for MySourceCheckpoint {
///     const SOURCE_TYPE: &'static str = "mysource";
///
///     fn to_cli_string(&self) -> String {
///         self.position.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { position: s.parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Source type identifier (e.g., "kafka").
    ///
    /// Stored in every checkpoint file and validated on load.
    const SOURCE_TYPE: &'static str;

    /// Convert to a compact string for logs and command-line use.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    fn to_cli_string(&self) -> String;

    /// Parse the format produced by `to_cli_string()`.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}

/// Object key of the stream metadata file.
pub const METADATA_KEY: &str = "metadata";

/// Key prefix of per-batch checkpoint files.
pub const OFFSETS_PREFIX: &str = "offsets/";

/// Object key of the checkpoint file for `batch_id`.
pub fn offsets_key(batch_id: u64) -> String {
    format!("{OFFSETS_PREFIX}{batch_id:020}")
}

/// Parse the batch id back out of a checkpoint file key.
pub fn batch_id_from_key(key: &str) -> Option<u64> {
    let name = key.strip_prefix(OFFSETS_PREFIX)?;
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}
