//! In-memory job store, the default backend and the test workhorse.

use crate::error::{Result, ScribedError};
use crate::job::{JobId, JobRecord, JobStatus, Lease};
use crate::store::JobStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<JobId, JobRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<JobId, JobRecord>>> {
        self.records.lock().map_err(|_| ScribedError::Storage {
            message: "job store lock poisoned".to_string(),
        })
    }
}

impl JobStore for MemoryStore {
    fn insert(&self, record: JobRecord) -> Result<()> {
        self.lock()?.insert(record.id, record);
        Ok(())
    }

    fn load(&self, id: JobId) -> Result<Option<JobRecord>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    fn update(
        &self,
        id: JobId,
        mutate: &mut dyn FnMut(&mut JobRecord) -> Result<()>,
    ) -> Result<JobRecord> {
        let mut records = self.lock()?;
        let record = records.get_mut(&id).ok_or(ScribedError::JobNotFound {
            job_id: id.to_string(),
        })?;
        mutate(record)?;
        Ok(record.clone())
    }

    fn claim(&self, id: JobId, worker_id: &str, ttl: Duration) -> Result<JobRecord> {
        let mut records = self.lock()?;
        let record = records.get_mut(&id).ok_or(ScribedError::JobNotFound {
            job_id: id.to_string(),
        })?;
        let now = Utc::now();
        if record.status != JobStatus::Pending || record.has_live_lease(now) {
            return Err(ScribedError::LeaseConflict {
                job_id: id.to_string(),
            });
        }
        record.lease = Some(Lease::new(worker_id, ttl, now));
        Ok(record.clone())
    }

    fn list(&self) -> Result<Vec<JobRecord>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn remove(&self, id: JobId) -> Result<()> {
        self.lock()?.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobOptions;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn new_record() -> JobRecord {
        JobRecord::new(
            "clip.wav",
            JobOptions::default(),
            "transcribe",
            PathBuf::from("/tmp/clip.wav"),
            Utc::now(),
        )
    }

    #[test]
    fn test_insert_load_remove() {
        let store = MemoryStore::new();
        let record = new_record();
        let id = record.id;

        store.insert(record).unwrap();
        assert!(store.load(id).unwrap().is_some());

        store.remove(id).unwrap();
        assert!(store.load(id).unwrap().is_none());
    }

    #[test]
    fn test_claim_requires_pending() {
        let store = MemoryStore::new();
        let mut record = new_record();
        record.status = JobStatus::Running;
        let id = record.id;
        store.insert(record).unwrap();

        let err = store.claim(id, "w0", Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, ScribedError::LeaseConflict { .. }));
    }

    #[test]
    fn test_claim_over_expired_lease() {
        let store = MemoryStore::new();
        let record = new_record();
        let id = record.id;
        store.insert(record).unwrap();

        store.claim(id, "w0", Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let claimed = store.claim(id, "w1", Duration::from_secs(60)).unwrap();
        assert_eq!(claimed.lease.unwrap().worker_id, "w1");
    }

    #[test]
    fn test_concurrent_claim_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let record = new_record();
        let id = record.id;
        store.insert(record).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .claim(id, &format!("worker-{n}"), Duration::from_secs(60))
                        .is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
    }
}
