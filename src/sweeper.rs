//! Retention sweeper: removes expired job outputs on a schedule.
//!
//! Terminal jobs older than the retention window lose their artifact files
//! and scratch audio. The job record itself is kept as metadata (id, status,
//! error) unless configured otherwise. Pending and running jobs are never
//! touched.

use crate::config::Config;
use crate::error::Result;
use crate::job::JobRecord;
use crate::store::PersistenceGateway;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct SweeperHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            tracing::error!("retention sweeper thread panicked");
        }
    }
}

pub struct RetentionSweeper {
    gateway: Arc<PersistenceGateway>,
    window: chrono::Duration,
    interval: Duration,
    keep_metadata: bool,
}

impl RetentionSweeper {
    pub fn new(gateway: Arc<PersistenceGateway>, config: &Config) -> Result<Self> {
        let window = config.retention_window()?;
        Ok(Self {
            gateway,
            window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::days(30)),
            interval: config.sweep_interval()?,
            keep_metadata: config.retention.keep_metadata,
        })
    }

    /// Spawns the periodic sweep thread.
    pub fn start(self) -> SweeperHandle {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let thread = thread::spawn(move || {
            while flag.load(Ordering::SeqCst) {
                match self.sweep_once(Utc::now()) {
                    Ok(0) => {}
                    Ok(swept) => tracing::info!(swept, "retention sweep complete"),
                    Err(e) => tracing::error!(error = %e, "retention sweep failed"),
                }
                let deadline = Instant::now() + self.interval;
                while flag.load(Ordering::SeqCst) && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(50));
                }
            }
        });
        SweeperHandle {
            running,
            thread: Some(thread),
        }
    }

    /// One sweep pass. Returns how many jobs were swept.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut swept = 0;
        for record in self.gateway.list()? {
            if !self.expired(&record, now) {
                continue;
            }
            self.sweep_job(&record)?;
            swept += 1;
        }
        Ok(swept)
    }

    fn expired(&self, record: &JobRecord, now: DateTime<Utc>) -> bool {
        if !record.status.is_terminal() || record.swept {
            return false;
        }
        let reference = record.finished_at.unwrap_or(record.created_at);
        reference + self.window <= now
    }

    fn sweep_job(&self, record: &JobRecord) -> Result<()> {
        for artifact in &record.artifacts {
            if let Err(e) = std::fs::remove_file(&artifact.path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %artifact.path.display(), error = %e, "failed to remove artifact");
            }
        }
        if let Err(e) = std::fs::remove_file(&record.audio_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %record.audio_path.display(), error = %e, "failed to remove scratch audio");
        }

        tracing::debug!(job = %record.id, "job outputs swept");
        if self.keep_metadata {
            self.gateway.mark_swept(record.id)
        } else {
            self.gateway.remove(record.id)
        }
    }
}
