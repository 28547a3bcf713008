//! Job model: identity, status lifecycle, options, and the persisted record.

use crate::export::Artifact;
use crate::types::Segment;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Opaque job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }

    /// Status transitions are monotonic: terminal states are never left,
    /// and the only path back from Running to Pending is the orphaned-lease
    /// recovery sweep.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Running) => true,
            // Cancellation before a worker claims the job.
            (JobStatus::Pending, JobStatus::Error) => true,
            (JobStatus::Running, JobStatus::Finished) => true,
            (JobStatus::Running, JobStatus::Error) => true,
            // Recovery re-queue after a lease expires.
            (JobStatus::Running, JobStatus::Pending) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whisper-family model size selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSize {
    Tiny,
    Base,
    #[default]
    Small,
    Medium,
    LargeV3,
}

impl ModelSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::LargeV3 => "large-v3",
        }
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large-v3" => Ok(ModelSize::LargeV3),
            other => Err(format!("unknown model size '{other}'")),
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job feature toggles and recognition hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    pub model_size: ModelSize,
    pub enable_diarization: bool,
    pub enable_punct: bool,
    pub enable_itn: bool,
    pub enable_dialect_map: bool,
    pub enable_redaction: bool,
    pub language_hint: Option<String>,
    pub custom_lexicon: Option<Vec<String>>,
    pub context_prompt: Option<String>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            model_size: ModelSize::Small,
            enable_diarization: true,
            enable_punct: true,
            enable_itn: true,
            enable_dialect_map: false,
            enable_redaction: false,
            language_hint: None,
            custom_lexicon: None,
            context_prompt: None,
        }
    }
}

/// Time-bound exclusive claim by one worker on one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub worker_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(worker_id: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            expires_at: now + ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::seconds(60)),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// The persisted record for one transcription request.
///
/// Only the persistence gateway mutates this; workers hand it mutations
/// through the gateway while holding the lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub filename: String,
    pub options: JobOptions,
    pub queue: String,
    pub status: JobStatus,
    pub current_stage: Option<String>,
    /// Completed-stage fraction in [0, 1].
    pub progress: f64,
    pub error_message: Option<String>,
    pub cancel_requested: bool,
    pub lease: Option<Lease>,
    /// Canonical decoded audio, written at submission.
    pub audio_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Stage outputs persisted at stage boundaries; kept on failure for
    /// partial-result retrieval.
    pub segments: Vec<Segment>,
    pub text: Option<String>,
    pub dialect_text: Option<String>,
    pub dialect_segment_texts: Option<Vec<String>>,
    pub redacted_segment_texts: Option<Vec<String>>,
    pub artifacts: Vec<Artifact>,
    /// How many times the recovery sweep has re-queued this job.
    pub requeue_count: u32,
    /// Set by the retention sweeper once artifacts have been removed.
    pub swept: bool,
}

impl JobRecord {
    pub fn new(
        filename: &str,
        options: JobOptions,
        queue: &str,
        audio_path: PathBuf,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            filename: filename.to_string(),
            options,
            queue: queue.to_string(),
            status: JobStatus::Pending,
            current_stage: None,
            progress: 0.0,
            error_message: None,
            cancel_requested: false,
            lease: None,
            audio_path,
            created_at: now,
            started_at: None,
            finished_at: None,
            segments: Vec::new(),
            text: None,
            dialect_text: None,
            dialect_segment_texts: None,
            redacted_segment_texts: None,
            artifacts: Vec::new(),
            requeue_count: 0,
            swept: false,
        }
    }

    /// True when a worker currently holds a live claim on this job.
    pub fn has_live_lease(&self, now: DateTime<Utc>) -> bool {
        self.lease.as_ref().is_some_and(|l| !l.is_expired(now))
    }
}
