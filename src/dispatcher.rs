//! Job dispatcher: the worker pool that drives queued jobs through the
//! stage pipeline.
//!
//! Workers pop job ids, claim them with a lease, run the enabled stages in
//! order, persist outputs at stage boundaries, and export artifacts on
//! success. A recovery thread re-queues (or fails) jobs whose worker died
//! mid-run.

use crate::config::{Config, RecoveryPolicy};
use crate::context::JobContext;
use crate::error::{Result, ScribedError};
use crate::export::{ArtifactFormat, AssembledResult, Exporter, TextVariant};
use crate::ingest;
use crate::job::{JobId, JobRecord, JobStatus};
use crate::queue::QueueSet;
use crate::stage::{Stage, StageError, StageRegistry};
use crate::store::PersistenceGateway;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POP_TIMEOUT: Duration = Duration::from_millis(100);

/// Handle to a running dispatcher.
pub struct DispatcherHandle {
    /// Flag to signal shutdown
    running: Arc<AtomicBool>,
    /// Join handles for spawned threads
    threads: Vec<JoinHandle<()>>,
    gateway: Arc<PersistenceGateway>,
    queues: Arc<QueueSet>,
    queue_names: Vec<String>,
}

impl DispatcherHandle {
    /// Waits for queued and in-flight jobs to reach a terminal state, up to
    /// `timeout`. Returns false when work remained at the deadline.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(50));
        }
    }

    fn idle(&self) -> bool {
        let queues_empty = self
            .queue_names
            .iter()
            .all(|q| self.queues.is_empty(q).unwrap_or(true));
        if !queues_empty {
            return false;
        }
        let now = chrono::Utc::now();
        match self.gateway.list() {
            Ok(records) => records
                .iter()
                .all(|r| r.status != JobStatus::Running && !r.has_live_lease(now)),
            Err(_) => false,
        }
    }
    /// Stops the dispatcher gracefully. Workers finish their current stage,
    /// then exit; threads that miss the deadline are detached.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + Duration::from_secs(5);
        let poll_interval = Duration::from_millis(50);

        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    if handle.join().is_err() {
                        tracing::error!("dispatcher thread panicked");
                    }
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    threads = self.threads.len(),
                    "shutdown deadline passed, detaching remaining threads"
                );
                break;
            }
            thread::sleep(poll_interval);
        }
    }

    /// Returns true if the dispatcher is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

pub struct Dispatcher {
    gateway: Arc<PersistenceGateway>,
    queues: Arc<QueueSet>,
    registry: Arc<StageRegistry>,
    exporter: Arc<Exporter>,
    config: Config,
    queue_names: Vec<String>,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<PersistenceGateway>,
        queues: Arc<QueueSet>,
        registry: Arc<StageRegistry>,
        exporter: Arc<Exporter>,
        config: Config,
    ) -> Self {
        let queue_names = vec![config.queue.default_queue.clone()];
        Self {
            gateway,
            queues,
            registry,
            exporter,
            config,
            queue_names,
        }
    }

    /// Queues the workers watch, in polling order.
    pub fn with_queue_names(mut self, names: Vec<String>) -> Self {
        if !names.is_empty() {
            self.queue_names = names;
        }
        self
    }

    /// Spawns the worker pool and the recovery thread.
    pub fn start(self) -> Result<DispatcherHandle> {
        self.config.validate()?;
        let lease_ttl = self.config.lease_ttl()?;
        let stage_timeout = self.config.stage_timeout()?;
        let recovery_interval = self.config.recovery_interval()?;

        let running = Arc::new(AtomicBool::new(true));
        let mut threads = Vec::new();

        for n in 0..self.config.worker.workers {
            let worker = Worker {
                worker_id: format!("worker-{n}"),
                gateway: self.gateway.clone(),
                queues: self.queues.clone(),
                registry: self.registry.clone(),
                exporter: self.exporter.clone(),
                queue_names: self.queue_names.clone(),
                lease_ttl,
                stage_timeout,
                running: running.clone(),
            };
            threads.push(thread::spawn(move || worker.run()));
        }

        let recovery = Recovery {
            gateway: self.gateway.clone(),
            queues: self.queues.clone(),
            policy: self.config.worker.recovery_policy,
            requeue_limit: self.config.worker.requeue_limit,
            interval: recovery_interval,
            running: running.clone(),
        };
        threads.push(thread::spawn(move || recovery.run()));

        tracing::info!(
            workers = self.config.worker.workers,
            queues = ?self.queue_names,
            "dispatcher started"
        );

        Ok(DispatcherHandle {
            running,
            threads,
            gateway: self.gateway,
            queues: self.queues,
            queue_names: self.queue_names,
        })
    }
}

struct Worker {
    worker_id: String,
    gateway: Arc<PersistenceGateway>,
    queues: Arc<QueueSet>,
    registry: Arc<StageRegistry>,
    exporter: Arc<Exporter>,
    queue_names: Vec<String>,
    lease_ttl: Duration,
    stage_timeout: Duration,
    running: Arc<AtomicBool>,
}

/// Why a job run stopped early.
enum Abort {
    /// Another worker owns the lease now; leave the record alone.
    LeaseLost,
    /// Terminal failure already recorded through the gateway.
    Failed,
}

impl Worker {
    fn run(&self) {
        while self.running.load(Ordering::SeqCst) {
            for queue in &self.queue_names {
                let id = match self.queues.pop_timeout(queue, POP_TIMEOUT) {
                    Ok(Some(id)) => id,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::error!(worker = %self.worker_id, error = %e, "queue pop failed");
                        continue;
                    }
                };

                match self.gateway.claim(id, &self.worker_id, self.lease_ttl) {
                    Ok(record) => self.run_job(record),
                    // Lost the race or the job was cancelled while queued.
                    Err(ScribedError::LeaseConflict { .. }) => {
                        tracing::debug!(worker = %self.worker_id, job = %id, "claim lost");
                    }
                    Err(ScribedError::JobNotFound { .. }) => {}
                    Err(e) => {
                        tracing::error!(worker = %self.worker_id, job = %id, error = %e, "claim failed");
                    }
                }
            }
        }
    }

    fn run_job(&self, record: JobRecord) {
        let id = record.id;
        tracing::info!(worker = %self.worker_id, job = %id, file = %record.filename, "job claimed");

        match self.execute(&record) {
            Ok(()) => {
                tracing::info!(worker = %self.worker_id, job = %id, "job finished");
            }
            Err(Abort::LeaseLost) => {
                tracing::warn!(worker = %self.worker_id, job = %id, "lease lost, abandoning job");
            }
            Err(Abort::Failed) => {
                tracing::warn!(worker = %self.worker_id, job = %id, "job failed");
            }
        }
    }

    fn execute(&self, record: &JobRecord) -> std::result::Result<(), Abort> {
        let id = record.id;
        let stages = self.registry.enabled_stages(&record.options);
        let total = stages.len();
        let first_stage = stages.first().map(|s| s.name()).unwrap_or("transcribe");

        self.gateway
            .mark_running(id, &self.worker_id, first_stage)
            .map_err(|e| self.fail(id, "dispatch", &e))?;

        let audio = ingest::load_canonical(&record.audio_path)
            .map_err(|e| self.fail(id, "ingest", &e))?;
        let mut ctx = JobContext::new(id, record.options.clone(), audio);

        for (index, stage) in stages.iter().enumerate() {
            self.stage_checkpoint(id, stage.name(), index, total)?;
            self.run_stage(id, *stage, &mut ctx)?;
            // Persist stage output so a failure later still leaves a
            // partial transcript behind.
            let done = (index + 1) as f64 / total as f64;
            self.gateway
                .update_progress(id, &self.worker_id, stage.name(), done, Some(&ctx.segments))
                .map_err(|e| self.fail(id, stage.name(), &e))?;
        }

        let result = AssembledResult::from_context(&ctx);
        let mut artifacts = Vec::new();
        for format in ArtifactFormat::ALL {
            let (artifact, _) = self
                .exporter
                .export(&result, format, TextVariant::Standard, false, &artifacts)
                .map_err(|e| self.fail(id, "export", &e))?;
            artifacts.push(artifact);
        }

        self.gateway
            .mark_finished(
                id,
                &self.worker_id,
                result.text,
                ctx.dialect_text.clone(),
                ctx.segments.clone(),
                ctx.dialect_segment_texts.clone(),
                ctx.redacted_segment_texts.clone(),
                artifacts,
            )
            .map_err(|e| self.fail(id, "finalize", &e))?;
        Ok(())
    }

    /// Stage boundary: observe cancellation, renew the lease, advance the
    /// status cursor.
    fn stage_checkpoint(
        &self,
        id: JobId,
        stage: &str,
        index: usize,
        total: usize,
    ) -> std::result::Result<(), Abort> {
        let snapshot = self
            .gateway
            .snapshot(id)
            .map_err(|e| self.fail(id, stage, &e))?;
        if snapshot.cancel_requested {
            let err = ScribedError::Cancelled {
                reason: "cancelled by request".to_string(),
            };
            return Err(self.fail(id, stage, &err));
        }

        match self.gateway.renew_lease(id, &self.worker_id, self.lease_ttl) {
            Ok(()) => {}
            Err(ScribedError::LeaseConflict { .. }) => return Err(Abort::LeaseLost),
            Err(e) => return Err(self.fail(id, stage, &e)),
        }

        let progress = index as f64 / total.max(1) as f64;
        self.gateway
            .update_progress(id, &self.worker_id, stage, progress, None)
            .map_err(|e| self.fail(id, stage, &e))?;
        Ok(())
    }

    fn run_stage(
        &self,
        id: JobId,
        stage: &dyn Stage,
        ctx: &mut JobContext,
    ) -> std::result::Result<(), Abort> {
        let started = Instant::now();
        let outcome = stage.process(ctx);
        let elapsed = started.elapsed();

        match outcome {
            Err(StageError::Cancelled { reason }) => {
                let err = ScribedError::Cancelled { reason };
                Err(self.fail(id, stage.name(), &err))
            }
            Err(StageError::Validation { message }) => {
                let err = ScribedError::Validation { message };
                Err(self.fail(id, stage.name(), &err))
            }
            Err(e) => {
                let err = ScribedError::Engine {
                    engine: stage.name().to_string(),
                    message: e.to_string(),
                };
                Err(self.fail(id, stage.name(), &err))
            }
            // The budget is checked after the stage returns; a stage cannot
            // be interrupted mid-call.
            Ok(()) if elapsed > self.stage_timeout => {
                let err = ScribedError::Timeout {
                    stage: stage.name().to_string(),
                    budget_ms: self.stage_timeout.as_millis() as u64,
                };
                Err(self.fail(id, stage.name(), &err))
            }
            Ok(()) => {
                tracing::debug!(
                    job = %id,
                    stage = stage.name(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "stage complete"
                );
                Ok(())
            }
        }
    }

    /// Records a terminal failure and maps it to an abort. A worker whose
    /// lease is gone may not fail the job; the new owner drives it now.
    fn fail(&self, id: JobId, stage: &str, error: &ScribedError) -> Abort {
        tracing::warn!(job = %id, stage, error = %error, "stage failed");
        match self
            .gateway
            .mark_error(id, Some(&self.worker_id), stage, &error.to_string())
        {
            Ok(()) => Abort::Failed,
            Err(ScribedError::LeaseConflict { .. }) => Abort::LeaseLost,
            Err(e) => {
                tracing::error!(job = %id, error = %e, "failed to record job error");
                Abort::Failed
            }
        }
    }
}

struct Recovery {
    gateway: Arc<PersistenceGateway>,
    queues: Arc<QueueSet>,
    policy: RecoveryPolicy,
    requeue_limit: u32,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl Recovery {
    fn run(&self) {
        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.sweep_once() {
                tracing::error!(error = %e, "recovery sweep failed");
            }
            // Sleep in short slices so shutdown stays responsive.
            let deadline = Instant::now() + self.interval;
            while self.running.load(Ordering::SeqCst) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(50));
            }
        }
    }

    fn sweep_once(&self) -> Result<()> {
        let now = chrono::Utc::now();
        for record in self.gateway.list()? {
            if record.status != JobStatus::Running || record.has_live_lease(now) {
                continue;
            }
            self.recover(&record)?;
        }
        Ok(())
    }

    fn recover(&self, record: &JobRecord) -> Result<()> {
        let id = record.id;
        let exhausted = record.requeue_count >= self.requeue_limit;
        if self.policy == RecoveryPolicy::MarkError || exhausted {
            tracing::warn!(job = %id, requeues = record.requeue_count, "worker lost, failing job");
            let stage = record.current_stage.as_deref().unwrap_or("dispatch");
            return self.gateway.mark_error(id, None, stage, "worker_lost");
        }

        tracing::warn!(job = %id, requeues = record.requeue_count, "worker lost, re-queueing");
        match self.gateway.requeue(id) {
            Ok(()) => self.queues.push(&record.queue, id),
            // A worker renewed between listing and re-queueing.
            Err(ScribedError::LeaseConflict { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobOptions, Lease};
    use crate::stage::{DialectMapper, Redactor};
    use crate::store::MemoryStore;
    use crate::types::Segment;
    use chrono::Utc;
    use std::path::PathBuf;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.worker.workers = 1;
        config.worker.recovery_interval = "50ms".to_string();
        config
    }

    fn registry_with_engine(engine: crate::engine::MockEngine) -> Arc<StageRegistry> {
        Arc::new(StageRegistry::standard(
            Arc::new(engine),
            Arc::new(crate::engine::MockDiarizer::default()),
            DialectMapper::default(),
            Redactor::default(),
        ))
    }

    fn submit(
        gateway: &PersistenceGateway,
        queues: &QueueSet,
        dir: &std::path::Path,
        options: JobOptions,
    ) -> JobId {
        let audio = crate::ingest::DecodedAudio {
            samples: vec![500i16; 16_000],
            sample_rate: crate::defaults::SAMPLE_RATE,
            source_path: None,
        };
        let audio_path = dir.join("clip.wav");
        crate::ingest::write_canonical(&audio_path, &audio).unwrap();
        let record = JobRecord::new("clip.wav", options, "transcribe", audio_path, Utc::now());
        let id = record.id;
        gateway.create(record).unwrap();
        queues.push("transcribe", id).unwrap();
        id
    }

    fn wait_terminal(gateway: &PersistenceGateway, id: JobId) -> JobRecord {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let record = gateway.snapshot(id).unwrap();
            if record.status.is_terminal() {
                return record;
            }
            assert!(Instant::now() < deadline, "job did not reach a terminal state");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_job_runs_to_finished_with_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());
        let engine = crate::engine::MockEngine::new()
            .with_segments(vec![Segment::new(0.0, 1.0, "สวัสดีครับ", 0.9)]);
        let exporter = Arc::new(Exporter::new(dir.path().join("artifacts")));

        let id = submit(&gateway, &queues, dir.path(), JobOptions::default());
        let handle = Dispatcher::new(
            gateway.clone(),
            queues,
            registry_with_engine(engine),
            exporter,
            test_config(),
        )
        .start()
        .unwrap();

        let record = wait_terminal(&gateway, id);
        handle.stop();

        assert_eq!(record.status, JobStatus::Finished);
        assert_eq!(record.text.as_deref(), Some("สวัสดีครับ"));
        assert_eq!(record.artifacts.len(), 4);
        assert!(record.lease.is_none());
        for artifact in &record.artifacts {
            assert!(artifact.path.exists());
        }
    }

    #[test]
    fn test_drain_waits_for_queued_work() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());
        let engine = crate::engine::MockEngine::new()
            .with_segments(vec![Segment::new(0.0, 1.0, "ok", 0.9)]);
        let exporter = Arc::new(Exporter::new(dir.path().join("artifacts")));

        let id = submit(&gateway, &queues, dir.path(), JobOptions::default());
        let handle = Dispatcher::new(
            gateway.clone(),
            queues,
            registry_with_engine(engine),
            exporter,
            test_config(),
        )
        .start()
        .unwrap();

        assert!(handle.drain(Duration::from_secs(5)));
        assert_eq!(gateway.snapshot(id).unwrap().status, JobStatus::Finished);
        handle.stop();
    }

    #[test]
    fn test_engine_failure_records_stage_name() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());
        let engine = crate::engine::MockEngine::new().with_failure(
            crate::engine::EngineError::Inference {
                message: "model crashed".to_string(),
            },
        );
        let exporter = Arc::new(Exporter::new(dir.path().join("artifacts")));

        let id = submit(&gateway, &queues, dir.path(), JobOptions::default());
        let handle = Dispatcher::new(
            gateway.clone(),
            queues,
            registry_with_engine(engine),
            exporter,
            test_config(),
        )
        .start()
        .unwrap();

        let record = wait_terminal(&gateway, id);
        handle.stop();

        assert_eq!(record.status, JobStatus::Error);
        let message = record.error_message.unwrap();
        assert!(message.starts_with("transcribe:"), "{message}");
        assert!(message.contains("model crashed"), "{message}");
    }

    #[test]
    fn test_unsupported_audio_surfaces_as_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());
        let engine = crate::engine::MockEngine::new().with_failure(
            crate::engine::EngineError::UnsupportedAudio {
                message: "8-bit samples".to_string(),
            },
        );
        let exporter = Arc::new(Exporter::new(dir.path().join("artifacts")));

        let id = submit(&gateway, &queues, dir.path(), JobOptions::default());
        let handle = Dispatcher::new(
            gateway.clone(),
            queues,
            registry_with_engine(engine),
            exporter,
            test_config(),
        )
        .start()
        .unwrap();

        let record = wait_terminal(&gateway, id);
        handle.stop();

        assert_eq!(record.status, JobStatus::Error);
        let message = record.error_message.unwrap();
        assert!(message.contains("Invalid audio input"), "{message}");
        assert!(!message.contains("engine failed"), "{message}");
    }

    #[test]
    fn test_stage_over_budget_fails_with_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());
        let engine = crate::engine::MockEngine::new()
            .with_segments(vec![Segment::new(0.0, 1.0, "ok", 0.9)])
            .with_delay(Duration::from_millis(100));
        let exporter = Arc::new(Exporter::new(dir.path().join("artifacts")));

        let mut config = test_config();
        config.worker.stage_timeout = "10ms".to_string();

        let id = submit(&gateway, &queues, dir.path(), JobOptions::default());
        let handle = Dispatcher::new(
            gateway.clone(),
            queues,
            registry_with_engine(engine),
            exporter,
            config,
        )
        .start()
        .unwrap();

        let record = wait_terminal(&gateway, id);
        handle.stop();

        assert_eq!(record.status, JobStatus::Error);
        let message = record.error_message.unwrap();
        assert!(message.contains("timed out") || message.contains("budget"), "{message}");
    }

    #[test]
    fn test_cancel_requested_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());
        let engine = crate::engine::MockEngine::new()
            .with_segments(vec![Segment::new(0.0, 1.0, "ok", 0.9)]);
        let exporter = Arc::new(Exporter::new(dir.path().join("artifacts")));

        let id = submit(&gateway, &queues, dir.path(), JobOptions::default());
        gateway.request_cancel(id).unwrap();

        let handle = Dispatcher::new(
            gateway.clone(),
            queues,
            registry_with_engine(engine),
            exporter,
            test_config(),
        )
        .start()
        .unwrap();

        let record = wait_terminal(&gateway, id);
        handle.stop();

        assert_eq!(record.status, JobStatus::Error);
        assert!(record.error_message.unwrap().contains("cancelled"));
    }

    #[test]
    fn test_recovery_requeues_orphaned_job() {
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());

        let mut record = JobRecord::new(
            "clip.wav",
            JobOptions::default(),
            "transcribe",
            PathBuf::from("/nonexistent/clip.wav"),
            Utc::now(),
        );
        record.status = JobStatus::Running;
        record.lease = Some(Lease::new("dead-worker", Duration::from_millis(1), Utc::now()));
        let id = record.id;
        gateway.create(record).unwrap();
        thread::sleep(Duration::from_millis(10));

        let recovery = Recovery {
            gateway: gateway.clone(),
            queues: queues.clone(),
            policy: RecoveryPolicy::Requeue,
            requeue_limit: 2,
            interval: Duration::from_millis(50),
            running: Arc::new(AtomicBool::new(true)),
        };
        recovery.sweep_once().unwrap();

        let record = gateway.snapshot(id).unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.requeue_count, 1);
        assert_eq!(
            queues
                .pop_timeout("transcribe", Duration::from_millis(10))
                .unwrap(),
            Some(id)
        );
    }

    #[test]
    fn test_recovery_fails_job_past_requeue_limit() {
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());

        let mut record = JobRecord::new(
            "clip.wav",
            JobOptions::default(),
            "transcribe",
            PathBuf::from("/nonexistent/clip.wav"),
            Utc::now(),
        );
        record.status = JobStatus::Running;
        record.current_stage = Some("transcribe".to_string());
        record.requeue_count = 2;
        let id = record.id;
        gateway.create(record).unwrap();

        let recovery = Recovery {
            gateway: gateway.clone(),
            queues,
            policy: RecoveryPolicy::Requeue,
            requeue_limit: 2,
            interval: Duration::from_millis(50),
            running: Arc::new(AtomicBool::new(true)),
        };
        recovery.sweep_once().unwrap();

        let record = gateway.snapshot(id).unwrap();
        assert_eq!(record.status, JobStatus::Error);
        assert!(record.error_message.unwrap().contains("worker_lost"));
    }

    #[test]
    fn test_mark_error_policy_never_requeues() {
        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());

        let mut record = JobRecord::new(
            "clip.wav",
            JobOptions::default(),
            "transcribe",
            PathBuf::from("/nonexistent/clip.wav"),
            Utc::now(),
        );
        record.status = JobStatus::Running;
        let id = record.id;
        gateway.create(record).unwrap();

        let recovery = Recovery {
            gateway: gateway.clone(),
            queues: queues.clone(),
            policy: RecoveryPolicy::MarkError,
            requeue_limit: 2,
            interval: Duration::from_millis(50),
            running: Arc::new(AtomicBool::new(true)),
        };
        recovery.sweep_once().unwrap();

        assert_eq!(gateway.snapshot(id).unwrap().status, JobStatus::Error);
        assert!(
            queues
                .pop_timeout("transcribe", Duration::from_millis(10))
                .unwrap()
                .is_none()
        );
    }
}
