//! Persistence gateway: the single mutator of persisted job records.

pub mod memory;

use crate::error::{Result, ScribedError};
use crate::export::Artifact;
use crate::job::{JobId, JobRecord, JobStatus};
use crate::types::Segment;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryStore;

/// Storage backend contract. Implementations must make `claim` atomic with
/// respect to concurrent callers; everything else is plain record I/O.
pub trait JobStore: Send + Sync {
    fn insert(&self, record: JobRecord) -> Result<()>;

    fn load(&self, id: JobId) -> Result<Option<JobRecord>>;

    /// Applies a mutation to one record under the store's write lock.
    fn update(
        &self,
        id: JobId,
        mutate: &mut dyn FnMut(&mut JobRecord) -> Result<()>,
    ) -> Result<JobRecord>;

    /// Atomically claims a pending job: writes a lease conditioned on the
    /// job still being pending with no live lease. Lost races return
    /// [`ScribedError::LeaseConflict`].
    fn claim(&self, id: JobId, worker_id: &str, ttl: Duration) -> Result<JobRecord>;

    fn list(&self) -> Result<Vec<JobRecord>>;

    fn remove(&self, id: JobId) -> Result<()>;
}

/// Wraps a store with transition enforcement and bounded retries for
/// storage failures. Workers and the service mutate job records only
/// through this gateway.
pub struct PersistenceGateway {
    store: Arc<dyn JobStore>,
    max_retries: u32,
    backoff: Duration,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            max_retries: 3,
            backoff: Duration::from_millis(50),
        }
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Retries only storage failures; validation, lease, and not-found
    /// errors surface immediately.
    fn with_retry<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "storage operation failed, retrying");
                    std::thread::sleep(self.backoff * attempt);
                }
                other => return other,
            }
        }
    }

    /// Lease-guarded write access. `Some(worker)` must hold the current
    /// lease; `None` callers (the service, the recovery sweep) are allowed
    /// only while no worker holds a live lease.
    fn check_writer(record: &JobRecord, worker_id: Option<&str>, id: JobId) -> Result<()> {
        let allowed = match worker_id {
            Some(worker) => record
                .lease
                .as_ref()
                .is_some_and(|lease| lease.worker_id == worker),
            None => !record.has_live_lease(Utc::now()),
        };
        if allowed {
            Ok(())
        } else {
            Err(ScribedError::LeaseConflict {
                job_id: id.to_string(),
            })
        }
    }

    fn transition(record: &mut JobRecord, next: JobStatus) -> Result<()> {
        if !record.status.can_transition_to(next) {
            return Err(ScribedError::InvalidTransition {
                from: record.status.to_string(),
                to: next.to_string(),
            });
        }
        record.status = next;
        Ok(())
    }

    pub fn create(&self, record: JobRecord) -> Result<()> {
        self.with_retry(|| self.store.insert(record.clone()))
    }

    pub fn snapshot(&self, id: JobId) -> Result<JobRecord> {
        self.with_retry(|| self.store.load(id))?
            .ok_or(ScribedError::JobNotFound {
                job_id: id.to_string(),
            })
    }

    pub fn list(&self) -> Result<Vec<JobRecord>> {
        self.with_retry(|| self.store.list())
    }

    pub fn claim(&self, id: JobId, worker_id: &str, ttl: Duration) -> Result<JobRecord> {
        self.with_retry(|| self.store.claim(id, worker_id, ttl))
    }

    /// Extends the caller's lease. Fails with a lease conflict when the
    /// lease was lost (expired and re-claimed, or re-queued).
    pub fn renew_lease(&self, id: JobId, worker_id: &str, ttl: Duration) -> Result<()> {
        let worker_id = worker_id.to_string();
        self.with_retry(|| {
            self.store
                .update(id, &mut |record| {
                    match &record.lease {
                        Some(lease) if lease.worker_id == worker_id => {
                            record.lease =
                                Some(crate::job::Lease::new(&worker_id, ttl, Utc::now()));
                            Ok(())
                        }
                        _ => Err(ScribedError::LeaseConflict {
                            job_id: id.to_string(),
                        }),
                    }
                })
                .map(|_| ())
        })
    }

    pub fn mark_running(&self, id: JobId, worker_id: &str, first_stage: &str) -> Result<()> {
        let worker_id = worker_id.to_string();
        let first_stage = first_stage.to_string();
        self.with_retry(|| {
            self.store
                .update(id, &mut |record| {
                    Self::check_writer(record, Some(&worker_id), id)?;
                    Self::transition(record, JobStatus::Running)?;
                    record.started_at = Some(Utc::now());
                    record.current_stage = Some(first_stage.clone());
                    record.progress = 0.0;
                    Ok(())
                })
                .map(|_| ())
        })
    }

    /// Persists the stage cursor and any partial segment output at a stage
    /// boundary. Rejected once the caller's lease is gone.
    pub fn update_progress(
        &self,
        id: JobId,
        worker_id: &str,
        stage: &str,
        progress: f64,
        partial_segments: Option<&[Segment]>,
    ) -> Result<()> {
        let worker_id = worker_id.to_string();
        let stage = stage.to_string();
        self.with_retry(|| {
            self.store
                .update(id, &mut |record| {
                    Self::check_writer(record, Some(&worker_id), id)?;
                    record.current_stage = Some(stage.clone());
                    record.progress = progress.clamp(0.0, 1.0);
                    if let Some(segments) = partial_segments {
                        record.segments = segments.to_vec();
                    }
                    Ok(())
                })
                .map(|_| ())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn mark_finished(
        &self,
        id: JobId,
        worker_id: &str,
        text: String,
        dialect_text: Option<String>,
        segments: Vec<Segment>,
        dialect_segment_texts: Option<Vec<String>>,
        redacted_segment_texts: Option<Vec<String>>,
        artifacts: Vec<Artifact>,
    ) -> Result<()> {
        self.with_retry(|| {
            let worker_id = worker_id.to_string();
            let text = text.clone();
            let dialect_text = dialect_text.clone();
            let segments = segments.clone();
            let dialect_segment_texts = dialect_segment_texts.clone();
            let redacted_segment_texts = redacted_segment_texts.clone();
            let artifacts = artifacts.clone();
            self.store
                .update(id, &mut move |record| {
                    Self::check_writer(record, Some(&worker_id), id)?;
                    Self::transition(record, JobStatus::Finished)?;
                    record.finished_at = Some(Utc::now());
                    record.progress = 1.0;
                    record.current_stage = None;
                    record.lease = None;
                    record.text = Some(text.clone());
                    record.dialect_text = dialect_text.clone();
                    record.segments = segments.clone();
                    record.dialect_segment_texts = dialect_segment_texts.clone();
                    record.redacted_segment_texts = redacted_segment_texts.clone();
                    record.artifacts = artifacts.clone();
                    Ok(())
                })
                .map(|_| ())
        })
    }

    /// Terminal failure, recording the failing stage. Partial outputs
    /// already persisted are kept for diagnostics. Workers pass their id
    /// and must still hold the lease; lease-less callers (the service, the
    /// recovery sweep) pass `None` and are rejected while a live lease
    /// exists.
    pub fn mark_error(
        &self,
        id: JobId,
        worker_id: Option<&str>,
        stage: &str,
        message: &str,
    ) -> Result<()> {
        let worker_id = worker_id.map(str::to_string);
        let stage = stage.to_string();
        let message = message.to_string();
        self.with_retry(|| {
            self.store
                .update(id, &mut |record| {
                    Self::check_writer(record, worker_id.as_deref(), id)?;
                    Self::transition(record, JobStatus::Error)?;
                    record.finished_at = Some(Utc::now());
                    record.current_stage = Some(stage.clone());
                    record.error_message = Some(format!("{stage}: {message}"));
                    record.lease = None;
                    Ok(())
                })
                .map(|_| ())
        })
    }

    /// Flags cooperative cancellation; the running worker observes it at
    /// its next stage boundary.
    pub fn request_cancel(&self, id: JobId) -> Result<()> {
        self.with_retry(|| {
            self.store
                .update(id, &mut |record| {
                    if !record.status.is_terminal() {
                        record.cancel_requested = true;
                    }
                    Ok(())
                })
                .map(|_| ())
        })
    }

    /// Recovery path: returns an orphaned running job to the queue. Only
    /// valid when the previous lease has expired.
    pub fn requeue(&self, id: JobId) -> Result<()> {
        self.with_retry(|| {
            self.store
                .update(id, &mut |record| {
                    let now = Utc::now();
                    if record.has_live_lease(now) {
                        return Err(ScribedError::LeaseConflict {
                            job_id: id.to_string(),
                        });
                    }
                    Self::transition(record, JobStatus::Pending)?;
                    record.lease = None;
                    record.current_stage = None;
                    record.progress = 0.0;
                    record.requeue_count += 1;
                    Ok(())
                })
                .map(|_| ())
        })
    }

    /// Retention bookkeeping: drops bulky outputs, keeping minimal metadata.
    pub fn mark_swept(&self, id: JobId) -> Result<()> {
        self.with_retry(|| {
            self.store
                .update(id, &mut |record| {
                    record.swept = true;
                    record.segments.clear();
                    record.artifacts.clear();
                    record.text = None;
                    record.dialect_text = None;
                    record.dialect_segment_texts = None;
                    record.redacted_segment_texts = None;
                    Ok(())
                })
                .map(|_| ())
        })
    }

    /// Appends an on-demand artifact record for a finished job.
    pub fn append_artifact(&self, id: JobId, artifact: Artifact) -> Result<()> {
        self.with_retry(|| {
            let artifact = artifact.clone();
            self.store
                .update(id, &mut move |record| {
                    if !record.artifacts.contains(&artifact) {
                        record.artifacts.push(artifact.clone());
                    }
                    Ok(())
                })
                .map(|_| ())
        })
    }

    pub fn remove(&self, id: JobId) -> Result<()> {
        self.with_retry(|| self.store.remove(id))
    }
}
