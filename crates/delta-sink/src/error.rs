//! Error types for `delta-sink`.

/// Result type for Delta operations.
pub type Result<T> = std::result::Result<T, DeltaError>;

/// Delta-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// Another writer committed this version first.
    #[error("conflict: delta log version {version} already exists")]
    Conflict {
        /// The version that could not be written.
        version: i64,
    },

    /// A batch whose schema differs from the table schema.
    #[error("schema mismatch: {message}")]
    SchemaMismatch {
        /// Human-readable mismatch details.
        message: String,
    },

    /// An Arrow type with no Delta equivalent.
    #[error("unsupported column type for '{column}': {data_type}")]
    UnsupportedType {
        /// Column name.
        column: String,
        /// Arrow type, stringified.
        data_type: String,
    },

    /// Appending zero rows.
    #[error("refusing to commit an empty batch")]
    EmptyBatch,

    /// The transaction log could not be interpreted.
    #[error("corrupt delta log: {message}")]
    CorruptLog {
        /// Human-readable details.
        message: String,
    },

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] object_storage::StorageError),

    /// Arrow array or record batch error.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encoding error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Failed to serialize/deserialize log actions.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeltaError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptLog {
            message: message.into(),
        }
    }

    pub(crate) fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }
}
