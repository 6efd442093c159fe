//! Worker pool draining the job queue.
//!
//! Each worker loops: take a job id off the queue, claim the record, call
//! the registered backend adapter with a bounded timeout, record the outcome.
//! A job that was cancelled while queued loses the claim and is skipped, so
//! nothing is ever processed twice. Usage is recorded only after a job
//! actually transitioned into the succeeded state.

use crate::account::AccountStore;
use crate::backend::{BackendRegistry, SynthesisBackend};
use crate::error::{VoxcastError, VoxcastResult};
use crate::job::{AudioHandle, FailureKind, JobId};
use crate::job_queue::JobQueue;
use crate::job_store::JobStore;
use crate::quota::QuotaLedger;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything a worker needs to process jobs
#[derive(Clone)]
pub struct WorkerContext {
    /// Queue the workers drain
    pub queue: Arc<JobQueue>,
    /// Store holding the job records
    pub store: Arc<JobStore>,
    /// Ledger that records successful completions
    pub ledger: Arc<QuotaLedger>,
    /// Account store receiving lifetime usage increments
    pub accounts: Arc<dyn AccountStore>,
    /// Registry of backend adapters
    pub backends: Arc<BackendRegistry>,
    /// Deadline applied to every backend call
    pub synthesis_timeout: Duration,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("queue_depth", &self.queue.depth())
            .field("jobs", &self.store.len())
            .field("backends", &self.backends.kinds())
            .field("synthesis_timeout", &self.synthesis_timeout)
            .finish()
    }
}

/// The pool of worker tasks executing synthesis jobs
#[derive(Debug)]
pub struct Dispatcher {
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Launch `worker_count` workers against the shared context
    #[must_use]
    pub fn spawn(worker_count: usize, ctx: Arc<WorkerContext>) -> Self {
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let ctx = Arc::clone(&ctx);
            workers.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, ctx).await;
            }));
        }
        info!("Dispatcher started with {worker_count} workers");
        Self { workers }
    }

    /// Number of workers in the pool
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    async fn worker_loop(worker_id: usize, ctx: Arc<WorkerContext>) {
        debug!("Worker {worker_id} started");
        while let Some(job_id) = ctx.queue.dequeue().await {
            Self::process_job(worker_id, &ctx, job_id).await;
        }
        debug!("Worker {worker_id} stopped");
    }

    async fn process_job(worker_id: usize, ctx: &WorkerContext, job_id: JobId) {
        // Claim and fetch in one locked pass. A cancellation that won the
        // race leaves the job terminal and the claim fails.
        let claim = ctx.store.update(&job_id, |job| {
            if job.start_running() {
                Some(job.clone())
            } else {
                None
            }
        });
        let job = match claim {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!("Worker {worker_id}: job {job_id} no longer queued, skipping");
                return;
            }
            Err(e) => {
                warn!("Worker {worker_id}: job {job_id} vanished before claim: {e}");
                return;
            }
        };

        let Some(backend) = ctx.backends.get(job.backend) else {
            warn!(
                "Worker {worker_id}: no adapter registered for the {} backend",
                job.backend
            );
            let _ = ctx.store.update(&job_id, |j| {
                j.fail(FailureKind::SynthesisFailed {
                    message: format!("No adapter registered for the {} backend", job.backend),
                })
            });
            return;
        };

        debug!(
            "Worker {worker_id}: synthesizing job {job_id} on '{}' ({} chars)",
            backend.name(),
            job.text.len()
        );

        let outcome = tokio::time::timeout(
            ctx.synthesis_timeout,
            backend.synthesize(&job.text, &job.params),
        )
        .await;

        match outcome {
            Ok(Ok(bytes)) => {
                let audio = AudioHandle::new(bytes);
                let applied = ctx
                    .store
                    .update(&job_id, |j| j.succeed(audio.clone()))
                    .unwrap_or(false);
                if applied {
                    let today = ctx.ledger.record_usage(&job.account_id, job.backend);
                    if let Err(e) = ctx.accounts.increment_usage(&job.account_id, job.backend).await
                    {
                        warn!(
                            "Usage increment failed for account '{}' after job {job_id}: {e}",
                            job.account_id
                        );
                    }
                    info!(
                        "Worker {worker_id}: job {job_id} succeeded ({} bytes, {today} on {} today)",
                        audio.len(),
                        job.backend
                    );
                }
            }
            Ok(Err(e)) => {
                warn!("Worker {worker_id}: job {job_id} failed: {e}");
                let _ = ctx.store.update(&job_id, |j| {
                    j.fail(FailureKind::SynthesisFailed {
                        message: e.to_string(),
                    })
                });
            }
            Err(_) => {
                warn!(
                    "Worker {worker_id}: job {job_id} timed out after {:?}",
                    ctx.synthesis_timeout
                );
                let _ = ctx.store.update(&job_id, |j| {
                    j.fail(FailureKind::SynthesisTimeout {
                        deadline: ctx.synthesis_timeout,
                    })
                });
            }
        }
    }

    /// Join all workers, aborting any that outlive the timeout
    ///
    /// The queue must be closed first or workers will never stop.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Timeout`] when a worker had to be aborted.
    pub async fn shutdown(self, timeout: Duration) -> VoxcastResult<()> {
        info!("Shutting down dispatcher ({} workers)", self.workers.len());
        let deadline = tokio::time::Instant::now() + timeout;

        let mut aborted = 0usize;
        for (worker_id, handle) in self.workers.into_iter().enumerate() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let abort = handle.abort_handle();
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(())) => debug!("Worker {worker_id} joined"),
                Ok(Err(e)) => warn!("Worker {worker_id} ended abnormally: {e}"),
                Err(_) => {
                    warn!("Worker {worker_id} did not stop in time, aborting");
                    abort.abort();
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            return Err(VoxcastError::timeout(format!(
                "{aborted} workers did not stop within {timeout:?}"
            )));
        }
        info!("Dispatcher shut down");
        Ok(())
    }
}
