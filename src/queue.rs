//! Named FIFO job queues.
//!
//! Each queue is an unbounded crossbeam channel of job ids. Queues are
//! created lazily on first use; ordering is FIFO per queue with no
//! priorities.

use crate::defaults::DEFAULT_QUEUE;
use crate::error::{Result, ScribedError};
use crate::job::JobId;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

struct Channel {
    sender: Sender<JobId>,
    receiver: Receiver<JobId>,
}

#[derive(Default)]
pub struct QueueSet {
    channels: Mutex<HashMap<String, Channel>>,
}

impl QueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_channel<T>(&self, name: &str, f: impl FnOnce(&Channel) -> T) -> Result<T> {
        let mut channels = self.channels.lock().map_err(|_| ScribedError::Storage {
            message: "queue lock poisoned".to_string(),
        })?;
        let channel = channels.entry(name.to_string()).or_insert_with(|| {
            let (sender, receiver) = unbounded();
            Channel { sender, receiver }
        });
        Ok(f(channel))
    }

    pub fn push(&self, queue: &str, id: JobId) -> Result<()> {
        self.with_channel(queue, |channel| channel.sender.send(id))?
            .map_err(|_| ScribedError::Storage {
                message: format!("queue '{queue}' closed"),
            })
    }

    /// Blocks up to `timeout` for the next job id; `None` on timeout.
    pub fn pop_timeout(&self, queue: &str, timeout: Duration) -> Result<Option<JobId>> {
        let receiver = self.with_channel(queue, |channel| channel.receiver.clone())?;
        match receiver.recv_timeout(timeout) {
            Ok(id) => Ok(Some(id)),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(ScribedError::Storage {
                    message: format!("queue '{queue}' closed"),
                })
            }
        }
    }

    pub fn len(&self, queue: &str) -> Result<usize> {
        self.with_channel(queue, |channel| channel.receiver.len())
    }

    pub fn is_empty(&self, queue: &str) -> Result<bool> {
        Ok(self.len(queue)? == 0)
    }
}

/// Normalizes a caller-supplied queue name; empty means the default queue.
pub fn normalize_queue_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_QUEUE.to_string()
    } else {
        trimmed.to_string()
    }
}
