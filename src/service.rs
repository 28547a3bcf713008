//! Job service: the submission and query surface.
//!
//! Validates uploads, writes canonical scratch audio, creates job records,
//! and enqueues them. Also answers status queries, serves artifacts (with
//! on-demand variant generation for finished jobs), and takes cancellation
//! requests.

use crate::config::Config;
use crate::error::{Result, ScribedError};
use crate::export::{Artifact, ArtifactFormat, AssembledResult, Exporter, TextVariant};
use crate::ingest;
use crate::job::{JobId, JobOptions, JobRecord, JobStatus};
use crate::queue::{QueueSet, normalize_queue_name};
use crate::store::PersistenceGateway;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only job view returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub id: String,
    pub filename: String,
    pub queue: String,
    pub status: JobStatus,
    pub current_stage: Option<String>,
    pub progress: f64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub artifacts: Vec<Artifact>,
    pub swept: bool,
}

impl StatusView {
    fn from_record(record: JobRecord) -> Self {
        Self {
            id: record.id.to_string(),
            filename: record.filename,
            queue: record.queue,
            status: record.status,
            current_stage: record.current_stage,
            progress: record.progress,
            error_message: record.error_message,
            created_at: record.created_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
            text: record.text,
            artifacts: record.artifacts,
            swept: record.swept,
        }
    }
}

pub struct JobService {
    gateway: Arc<PersistenceGateway>,
    queues: Arc<QueueSet>,
    exporter: Arc<Exporter>,
    scratch_dir: PathBuf,
    max_upload_bytes: u64,
}

impl JobService {
    pub fn new(
        gateway: Arc<PersistenceGateway>,
        queues: Arc<QueueSet>,
        exporter: Arc<Exporter>,
        config: &Config,
    ) -> Result<Self> {
        let scratch_dir = config.data_dir().join("scratch");
        std::fs::create_dir_all(&scratch_dir).map_err(|e| ScribedError::Storage {
            message: format!("failed to create scratch dir {}: {e}", scratch_dir.display()),
        })?;
        Ok(Self {
            gateway,
            queues,
            exporter,
            scratch_dir,
            max_upload_bytes: config.max_upload_bytes(),
        })
    }

    /// Accepts a WAV upload, creates the job, and enqueues it.
    pub fn submit(
        &self,
        mut reader: Box<dyn Read + Send>,
        filename: &str,
        options: JobOptions,
        queue: Option<&str>,
    ) -> Result<JobRecord> {
        validate_filename(filename)?;

        // Size cap before decoding; one byte past the cap is enough to reject.
        let mut bytes = Vec::new();
        reader
            .by_ref()
            .take(self.max_upload_bytes + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(ScribedError::Validation {
                message: format!(
                    "upload exceeds the {} byte limit",
                    self.max_upload_bytes
                ),
            });
        }

        let audio = ingest::decode_wav(Box::new(std::io::Cursor::new(bytes)))?;
        self.enqueue(audio, filename, options, queue, None)
    }

    /// Submits a WAV already on disk. A `.json` transcript sidecar next to
    /// the file is copied along so the fixture engine can find it.
    pub fn submit_path(
        &self,
        path: &Path,
        options: JobOptions,
        queue: Option<&str>,
    ) -> Result<JobRecord> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ScribedError::Validation {
                message: format!("invalid audio path {}", path.display()),
            })?
            .to_string();
        validate_filename(&filename)?;

        let size = std::fs::metadata(path)?.len();
        if size > self.max_upload_bytes {
            return Err(ScribedError::Validation {
                message: format!("upload exceeds the {} byte limit", self.max_upload_bytes),
            });
        }

        let audio = ingest::decode_wav_file(path)?;
        let sidecar = path.with_extension("json");
        let sidecar = sidecar.exists().then_some(sidecar);
        self.enqueue(audio, &filename, options, queue, sidecar)
    }

    fn enqueue(
        &self,
        audio: ingest::DecodedAudio,
        filename: &str,
        options: JobOptions,
        queue: Option<&str>,
        sidecar: Option<PathBuf>,
    ) -> Result<JobRecord> {
        let queue = normalize_queue_name(queue.unwrap_or_default());
        let mut record = JobRecord::new(filename, options, &queue, PathBuf::new(), Utc::now());
        record.audio_path = self.scratch_dir.join(format!("{}.wav", record.id));
        ingest::write_canonical(&record.audio_path, &audio)?;

        if let Some(sidecar) = sidecar {
            let target = record.audio_path.with_extension("json");
            std::fs::copy(&sidecar, &target).map_err(|e| ScribedError::Storage {
                message: format!("failed to copy sidecar {}: {e}", sidecar.display()),
            })?;
        }

        self.gateway.create(record.clone())?;
        self.queues.push(&queue, record.id)?;
        tracing::info!(job = %record.id, file = filename, queue, "job submitted");
        Ok(record)
    }

    pub fn status(&self, id: JobId) -> Result<StatusView> {
        Ok(StatusView::from_record(self.gateway.snapshot(id)?))
    }

    pub fn list(&self) -> Result<Vec<StatusView>> {
        let mut views: Vec<StatusView> = self
            .gateway
            .list()?
            .into_iter()
            .map(StatusView::from_record)
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(views)
    }

    /// Returns one artifact's bytes for a finished job, generating the
    /// requested format/variant on demand if it was not part of the standard
    /// export set.
    pub fn artifact(
        &self,
        id: JobId,
        format: ArtifactFormat,
        variant: TextVariant,
        redacted: bool,
    ) -> Result<(Artifact, Vec<u8>)> {
        let record = self.gateway.snapshot(id)?;
        if record.status != JobStatus::Finished {
            return Err(ScribedError::NotReady {
                job_id: id.to_string(),
                status: record.status.to_string(),
            });
        }
        if record.swept {
            return Err(ScribedError::Validation {
                message: "job outputs were removed by retention".to_string(),
            });
        }

        let result = AssembledResult {
            job_id: record.id.to_string(),
            text: record.text.clone().unwrap_or_default(),
            segments: record.segments.clone(),
            dialect_text: record.dialect_text.clone(),
            dialect_segment_texts: record.dialect_segment_texts.clone(),
            redacted_segment_texts: record.redacted_segment_texts.clone(),
        };
        let (artifact, reused) =
            self.exporter
                .export(&result, format, variant, redacted, &record.artifacts)?;
        if !reused {
            self.gateway.append_artifact(id, artifact.clone())?;
        }
        let bytes = self.exporter.read(&artifact)?;
        Ok((artifact, bytes))
    }

    /// Cancels a job. Pending jobs fail immediately; running jobs get the
    /// cooperative flag and stop at their next stage boundary. Terminal jobs
    /// are left as they are.
    pub fn cancel(&self, id: JobId) -> Result<StatusView> {
        let record = self.gateway.snapshot(id)?;
        match record.status {
            JobStatus::Pending => {
                self.gateway.request_cancel(id)?;
                match self
                    .gateway
                    .mark_error(id, None, "dispatch", "cancelled before dispatch")
                {
                    Ok(()) => {}
                    // A worker claimed the job in the meantime; the flag set
                    // above stops it at the next stage boundary.
                    Err(ScribedError::LeaseConflict { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            JobStatus::Running => {
                self.gateway.request_cancel(id)?;
                tracing::info!(job = %id, "cancellation requested");
            }
            JobStatus::Finished | JobStatus::Error => {}
        }
        self.status(id)
    }
}

fn validate_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(ScribedError::Validation {
            message: "filename must not be empty".to_string(),
        });
    }
    let lower = filename.to_ascii_lowercase();
    if !lower.ends_with(".wav") {
        return Err(ScribedError::Validation {
            message: format!("unsupported audio format for '{filename}', expected WAV"),
        });
    }
    Ok(())
}
