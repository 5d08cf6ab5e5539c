//! Error types for object storage.

use thiserror::Error;

/// Errors that can occur while talking to an object store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// An S3 request failed.
    #[error("S3 {operation} failed for '{key}': {message}")]
    S3 {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Local filesystem error.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A key that cannot be mapped onto the backend.
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),
}

impl StorageError {
    pub(crate) fn s3<E>(operation: &'static str, key: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::S3 {
            operation,
            key: key.into(),
            message: aws_sdk_s3::error::DisplayErrorContext(&err).to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
