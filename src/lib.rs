//! scribed - asynchronous dialect-aware transcription job pipeline
//!
//! Jobs are submitted as WAV uploads, queued, and driven through an ordered
//! stage pipeline (language detection, recognition, diarization, text
//! post-processing) by a lease-based worker pool. Results are exported as
//! versioned transcript artifacts.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod config;
pub mod context;
pub mod defaults;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingest;
pub mod job;
pub mod queue;
pub mod service;
pub mod stage;
pub mod store;
pub mod sweeper;
pub mod types;

// Core traits (engine → stages → export)
pub use engine::{AsrEngine, Diarizer};
pub use stage::{Stage, StageRegistry};

// Job pipeline
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use service::{JobService, StatusView};
pub use sweeper::RetentionSweeper;

// Error handling
pub use error::{Result, ScribedError};

// Config
pub use config::{Config, RecoveryPolicy};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }
}
