//! Error types for the performance monitor.
//!
//! Instrumentation calls never fail. Errors only come from loading
//! configuration and serializing summaries.

use thiserror::Error;

/// Errors that can occur at the edges of the monitor.
#[derive(Debug, Error)]
pub enum PerfError {
    /// Failed to serialize a summary
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Configuration parsed but holds unusable values
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for monitor operations that can fail.
pub type PerfResult<T> = Result<T, PerfError>;
