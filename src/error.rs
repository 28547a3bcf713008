//! Error types for scribed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribedError {
    // Input validation (never retried)
    #[error("Invalid audio input: {message}")]
    Validation { message: String },

    // Engine failures (ASR / diarization)
    #[error("{engine} engine failed: {message}")]
    Engine { engine: String, message: String },

    // Stage exceeded its configured budget
    #[error("Stage '{stage}' exceeded its {budget_ms} ms budget")]
    Timeout { stage: String, budget_ms: u64 },

    // Lost a claim race; silently skipped by the losing worker
    #[error("Job {job_id} is claimed by another worker")]
    LeaseConflict { job_id: String },

    // Persistence / artifact I/O (retried a bounded number of times)
    #[error("Storage operation failed: {message}")]
    Storage { message: String },

    #[error("Job {job_id} not found")]
    JobNotFound { job_id: String },

    #[error("Job {job_id} is not finished (status: {status})")]
    NotReady { job_id: String, status: String },

    #[error("Job cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Invalid status transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribedError>;

impl ScribedError {
    /// True for infrastructure failures the persistence gateway may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScribedError::Storage { .. })
    }
}
