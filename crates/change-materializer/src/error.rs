use thiserror::Error;

/// Errors that stop the materializer.
#[derive(Debug, Error)]
pub enum MaterializerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] kafka_source::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] object_storage::StorageError),

    #[error("Delta error: {0}")]
    Delta(#[from] delta_sink::DeltaError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl MaterializerError {
    pub(crate) fn checkpoint(err: anyhow::Error) -> Self {
        Self::Checkpoint(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, MaterializerError>;
