//! Bounded FIFO queue carrying admitted job ids to the workers.
//!
//! Admission reserves a slot before any job record exists, so a saturated
//! queue rejects fast and leaves no trace. Workers share one receiver behind
//! an async mutex, which is what hands each job id to exactly one worker.
//! Closing the queue drops the sender; workers drain what is buffered and
//! then see `None`, their signal to stop.

use crate::error::{VoxcastError, VoxcastResult};
use crate::job::JobId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Bounded FIFO queue of admitted job ids
#[derive(Debug)]
pub struct JobQueue {
    tx: parking_lot::Mutex<Option<mpsc::Sender<JobId>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<JobId>>,
    capacity: usize,
    depth: Arc<AtomicUsize>,
}

/// A reserved queue slot.
///
/// Dropping an unsent permit releases the slot.
#[derive(Debug)]
pub struct QueuePermit {
    permit: mpsc::OwnedPermit<JobId>,
    depth: Arc<AtomicUsize>,
}

impl QueuePermit {
    /// Enqueue a job id into the reserved slot
    pub fn send(self, job_id: JobId) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.permit.send(job_id);
    }
}

impl JobQueue {
    /// Create a queue holding at most `capacity` pending jobs
    ///
    /// `capacity` must be at least 1; service configuration validation
    /// enforces this before construction.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx: parking_lot::Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            capacity,
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reserve a slot, failing fast when the queue is full
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::QueueSaturated`] when all slots are taken, or
    /// [`VoxcastError::InvalidInput`] when the queue is closed.
    pub fn reserve(&self) -> VoxcastResult<QueuePermit> {
        let tx = self
            .tx
            .lock()
            .clone()
            .ok_or_else(|| VoxcastError::invalid_input("Job queue is closed"))?;

        match tx.try_reserve_owned() {
            Ok(permit) => Ok(QueuePermit {
                permit,
                depth: Arc::clone(&self.depth),
            }),
            Err(TrySendError::Full(_)) => Err(VoxcastError::queue_saturated(self.capacity)),
            Err(TrySendError::Closed(_)) => {
                Err(VoxcastError::invalid_input("Job queue is closed"))
            }
        }
    }

    /// Take the next job id, suspending while the queue is empty
    ///
    /// Returns `None` once the queue is closed and drained. Exactly one
    /// caller receives each id.
    pub async fn dequeue(&self) -> Option<JobId> {
        let mut rx = self.rx.lock().await;
        let job_id = rx.recv().await;
        if job_id.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        job_id
    }

    /// Close the queue to new work; buffered jobs remain dequeueable
    pub fn close(&self) {
        if self.tx.lock().take().is_some() {
            debug!("Job queue closed");
        }
    }

    /// Check whether the queue has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// The configured maximum number of pending jobs
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs currently waiting in the queue
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}
