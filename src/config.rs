use crate::defaults::{
    DEFAULT_LANGUAGE, DEFAULT_LEASE_TTL, DEFAULT_MAX_UPLOAD_MB, DEFAULT_QUEUE,
    DEFAULT_RECOVERY_INTERVAL, DEFAULT_REQUEUE_LIMIT, DEFAULT_RETENTION_WINDOW,
    DEFAULT_STAGE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, DEFAULT_WORKERS,
};
use crate::error::{Result, ScribedError};
use crate::job::ModelSize;
use crate::stage::redact::RedactPattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub pipeline: PipelineConfig,
    pub retention: RetentionConfig,
}

/// Artifact and scratch storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for scratch audio and exported artifacts. Defaults to the
    /// platform data directory.
    pub data_dir: Option<PathBuf>,
}

/// Queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub default_queue: String,
}

/// Worker pool and lease configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub workers: usize,
    /// Lease time-to-live, humantime syntax ("60s", "2m").
    pub lease_ttl: String,
    /// Per-stage wall-clock budget.
    pub stage_timeout: String,
    /// How often the recovery sweep looks for expired leases.
    pub recovery_interval: String,
    /// How many times an orphaned job is re-queued before the recovery
    /// policy gives up on it.
    pub requeue_limit: u32,
    pub recovery_policy: RecoveryPolicy,
}

/// What to do with a running job whose lease expired and whose re-queue
/// budget is spent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryPolicy {
    /// Put it back on its queue for another worker.
    #[default]
    Requeue,
    /// Fail it with a worker-lost error.
    MarkError,
}

/// Transcription pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Default language when the job gives no hint.
    pub language: String,
    /// Default recognition model when the job does not pick one.
    pub model_size: ModelSize,
    pub max_upload_mb: u64,
    /// Extra dialect rows merged over the built-in tables.
    pub dialect_csv: Option<PathBuf>,
    /// Redaction patterns; empty means the built-in set.
    pub redact_patterns: Vec<RedactPattern>,
}

/// Retention sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Age past which terminal jobs are swept.
    pub window: String,
    pub sweep_interval: String,
    /// Keep the job record (id, status, error) after sweeping its outputs.
    pub keep_metadata: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: None }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_queue: DEFAULT_QUEUE.to_string(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            lease_ttl: DEFAULT_LEASE_TTL.to_string(),
            stage_timeout: DEFAULT_STAGE_TIMEOUT.to_string(),
            recovery_interval: DEFAULT_RECOVERY_INTERVAL.to_string(),
            requeue_limit: DEFAULT_REQUEUE_LIMIT,
            recovery_policy: RecoveryPolicy::Requeue,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            model_size: ModelSize::default(),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            dialect_csv: None,
            redact_patterns: Vec::new(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RETENTION_WINDOW.to_string(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL.to_string(),
            keep_metadata: true,
        }
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| ScribedError::ConfigInvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SCRIBED_DATA_DIR → storage.data_dir
    /// - SCRIBED_QUEUE → queue.default_queue
    /// - SCRIBED_WORKERS → worker.workers
    /// - SCRIBED_LANGUAGE → pipeline.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("SCRIBED_DATA_DIR")
            && !dir.is_empty()
        {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(queue) = std::env::var("SCRIBED_QUEUE")
            && !queue.is_empty()
        {
            self.queue.default_queue = queue;
        }

        if let Ok(workers) = std::env::var("SCRIBED_WORKERS")
            && let Ok(workers) = workers.parse()
        {
            self.worker.workers = workers;
        }

        if let Ok(language) = std::env::var("SCRIBED_LANGUAGE")
            && !language.is_empty()
        {
            self.pipeline.language = language;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/scribed/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scribed").join("config.toml"))
    }

    /// Storage root, falling back to the platform data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("scribed")))
            .unwrap_or_else(|| PathBuf::from("./scribed-data"))
    }

    pub fn lease_ttl(&self) -> Result<Duration> {
        parse_duration("worker.lease_ttl", &self.worker.lease_ttl)
    }

    pub fn stage_timeout(&self) -> Result<Duration> {
        parse_duration("worker.stage_timeout", &self.worker.stage_timeout)
    }

    pub fn recovery_interval(&self) -> Result<Duration> {
        parse_duration("worker.recovery_interval", &self.worker.recovery_interval)
    }

    pub fn retention_window(&self) -> Result<Duration> {
        parse_duration("retention.window", &self.retention.window)
    }

    pub fn sweep_interval(&self) -> Result<Duration> {
        parse_duration("retention.sweep_interval", &self.retention.sweep_interval)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.pipeline.max_upload_mb * 1024 * 1024
    }

    /// Rejects values that would wedge the dispatcher.
    pub fn validate(&self) -> Result<()> {
        if self.worker.workers == 0 {
            return Err(ScribedError::ConfigInvalidValue {
                key: "worker.workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.max_upload_mb == 0 {
            return Err(ScribedError::ConfigInvalidValue {
                key: "pipeline.max_upload_mb".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let lease_ttl = self.lease_ttl()?;
        let stage_timeout = self.stage_timeout()?;
        // Workers renew their lease only between stages; a TTL shorter
        // than the stage budget would expire mid-stage and hand the job
        // to a second worker.
        if lease_ttl < stage_timeout {
            return Err(ScribedError::ConfigInvalidValue {
                key: "worker.lease_ttl".to_string(),
                message: format!(
                    "must be at least worker.stage_timeout ({})",
                    self.worker.stage_timeout
                ),
            });
        }
        self.recovery_interval()?;
        self.retention_window()?;
        self.sweep_interval()?;
        Ok(())
    }
}
