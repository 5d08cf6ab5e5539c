//! Error types for the load generator.

use thiserror::Error;

/// Errors that can occur while populating PostgreSQL.
#[derive(Error, Debug)]
pub enum PopulatorError {
    /// PostgreSQL connection or query error.
    #[error("PostgreSQL error: {0}")]
    PostgreSQL(#[from] tokio_postgres::Error),

    /// Missing or malformed environment configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A random choice was requested from an empty set of rows.
    #[error("Cannot sample from empty {0} set")]
    EmptySample(&'static str),

    /// Invalid sampling weights.
    #[error("Invalid operation weights: {0}")]
    Weights(#[from] rand::distr::weighted::Error),
}
