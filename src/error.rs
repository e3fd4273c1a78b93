//! Unified error handling for the proximity pipeline.
//!
//! The taxonomy distinguishes recoverable per-record problems (skipped and
//! counted by the caller) from run-aborting failures: exhausted source
//! retries, invalid configuration, and corrupt checkpoints.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`ProximityError`].
pub type Result<T> = std::result::Result<T, ProximityError>;

/// Errors produced by the proximity detection pipeline.
#[derive(Debug, Error)]
pub enum ProximityError {
    /// Configuration rejected at startup; never recoverable at runtime.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A single source query failed. Retried at the chunk boundary.
    #[error("source query failed: {message}")]
    Source { message: String },

    /// The retry budget for a source operation ran out.
    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    SourceExhausted {
        operation: String,
        attempts: u32,
        message: String,
    },

    /// A malformed input record. Callers skip and count these.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// Checkpoint file exists but does not describe a resumable run.
    #[error("checkpoint {} is inconsistent: {reason}", path.display())]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ProximityError {
    /// Whether the error only affects one record and the run may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProximityError::Source { .. } | ProximityError::MalformedRecord { .. }
        )
    }
}
