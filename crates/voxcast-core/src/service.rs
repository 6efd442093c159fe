//! Synthesis service facade tying admission control to the worker pool.
//!
//! [`SynthesisService`] is the single entry point callers interact with. A
//! submission passes the admission pipeline (input validation, rate limit,
//! plan lookup, quota check, queue reservation) before a job record is
//! created, so every rejection leaves no trace in the store or the queue.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::account::{AccountId, AccountStore};
use crate::backend::{BackendKind, BackendRegistry};
use crate::dispatcher::{Dispatcher, WorkerContext};
use crate::error::{VoxcastError, VoxcastResult};
use crate::job::{Job, JobId, JobSnapshot};
use crate::job_queue::JobQueue;
use crate::job_store::JobStore;
use crate::quota::{PlanCatalog, QuotaLedger};
use crate::rate_limiter::RateLimiter;
use crate::voice::{Voice, VoiceCatalog, VoiceParams};

/// How often `await_completion` re-reads a pending job's status.
const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Configuration for the synthesis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Number of dispatcher workers draining the queue
    pub worker_count: usize,
    /// Maximum number of jobs waiting in the queue
    pub queue_capacity: usize,
    /// Width of the per-account admission window in seconds
    pub rate_limit_window_secs: u64,
    /// Submissions allowed per account within one window
    pub rate_limit_max: usize,
    /// Deadline for a single backend synthesis call in seconds
    pub synthesis_timeout_secs: u64,
    /// Longest accepted text payload in characters
    pub max_text_length: usize,
    /// Daily per-backend limits for each plan tier
    pub plans: PlanCatalog,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            queue_capacity: crate::DEFAULT_QUEUE_CAPACITY,
            rate_limit_window_secs: crate::DEFAULT_RATE_LIMIT_WINDOW_SECS,
            rate_limit_max: crate::DEFAULT_RATE_LIMIT_MAX,
            synthesis_timeout_secs: crate::DEFAULT_SYNTHESIS_TIMEOUT_SECS,
            max_text_length: crate::MAX_TEXT_LENGTH,
            plans: PlanCatalog::new(),
        }
    }
}

impl ServiceConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Configuration`] if any count is zero or the
    /// plan catalog is malformed.
    pub fn validate(&self) -> VoxcastResult<()> {
        if self.worker_count == 0 {
            return Err(VoxcastError::configuration(
                "Worker count must be greater than 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(VoxcastError::configuration(
                "Queue capacity must be greater than 0",
            ));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(VoxcastError::configuration(
                "Rate limit window must be greater than 0 seconds",
            ));
        }
        if self.rate_limit_max == 0 {
            return Err(VoxcastError::configuration(
                "Rate limit must allow at least 1 submission per window",
            ));
        }
        if self.synthesis_timeout_secs == 0 {
            return Err(VoxcastError::configuration(
                "Synthesis timeout must be greater than 0 seconds",
            ));
        }
        if self.max_text_length == 0 {
            return Err(VoxcastError::configuration(
                "Maximum text length must be greater than 0",
            ));
        }
        self.plans.validate()
    }

    /// Parse a configuration from a TOML document
    ///
    /// Missing keys fall back to their defaults, so a partial document is
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Configuration`] if the document does not parse
    /// or the parsed values fail validation.
    pub fn from_toml_str(document: &str) -> VoxcastResult<Self> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file on disk
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Configuration`] if the file cannot be read,
    /// does not parse, or fails validation.
    pub fn from_toml_file(path: &Path) -> VoxcastResult<Self> {
        let document = std::fs::read_to_string(path)?;
        Self::from_toml_str(&document)
    }

    /// The admission window as a [`Duration`]
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// The per-call synthesis deadline as a [`Duration`]
    #[must_use]
    pub const fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}

/// Receipt returned for an accepted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    /// Identifier to poll or cancel the job with
    pub job_id: JobId,
    /// Backend the job was admitted for
    pub backend: BackendKind,
}

/// Point-in-time counters for the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    /// Jobs currently waiting in the queue
    pub queue_depth: usize,
    /// Maximum number of queued jobs
    pub queue_capacity: usize,
    /// Number of dispatcher workers
    pub worker_count: usize,
    /// Total job records held by the store
    pub job_count: usize,
    /// Backends with a registered adapter
    pub registered_backends: Vec<BackendKind>,
}

/// Usage-metered text-to-speech synthesis service
///
/// Owns the admission pipeline and the dispatcher worker pool. Submissions
/// that pass admission are queued and picked up by workers; callers track
/// their jobs through [`poll`](Self::poll) or
/// [`await_completion`](Self::await_completion).
#[derive(Debug)]
pub struct SynthesisService {
    config: ServiceConfig,
    rate_limiter: RateLimiter,
    ledger: Arc<QuotaLedger>,
    queue: Arc<JobQueue>,
    store: Arc<JobStore>,
    accounts: Arc<dyn AccountStore>,
    backends: Arc<BackendRegistry>,
    catalog: VoiceCatalog,
    dispatcher: Mutex<Option<Dispatcher>>,
}

impl SynthesisService {
    /// Create a service with the default configuration
    ///
    /// Must be called from within a tokio runtime so the dispatcher workers
    /// can be spawned.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Configuration`] if the default configuration
    /// fails validation.
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        backends: BackendRegistry,
    ) -> VoxcastResult<Self> {
        Self::with_config(ServiceConfig::default(), accounts, backends)
    }

    /// Create a service with a custom configuration
    ///
    /// Must be called from within a tokio runtime so the dispatcher workers
    /// can be spawned.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Configuration`] if the configuration fails
    /// validation.
    pub fn with_config(
        config: ServiceConfig,
        accounts: Arc<dyn AccountStore>,
        backends: BackendRegistry,
    ) -> VoxcastResult<Self> {
        config.validate()?;
        info!(
            "Starting synthesis service: {} workers, queue capacity {}",
            config.worker_count, config.queue_capacity
        );

        let queue = Arc::new(JobQueue::new(config.queue_capacity));
        let store = Arc::new(JobStore::new());
        let ledger = Arc::new(QuotaLedger::new(config.plans.clone()));
        let backends = Arc::new(backends);
        let context = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            store: Arc::clone(&store),
            ledger: Arc::clone(&ledger),
            accounts: Arc::clone(&accounts),
            backends: Arc::clone(&backends),
            synthesis_timeout: config.synthesis_timeout(),
        });
        let dispatcher = Dispatcher::spawn(config.worker_count, context);
        let rate_limiter = RateLimiter::new(config.rate_limit_window(), config.rate_limit_max);

        Ok(Self {
            config,
            rate_limiter,
            ledger,
            queue,
            store,
            accounts,
            backends,
            catalog: VoiceCatalog::new(),
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Replace the stock voice catalog
    #[must_use]
    pub fn with_voice_catalog(mut self, catalog: VoiceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Submit text for synthesis on a backend
    ///
    /// Runs the admission pipeline in order: input validation, rate limit,
    /// plan lookup, quota check, queue reservation. The job record is only
    /// created once every gate has passed, so a rejected submission leaves
    /// no trace. The rate limit is charged as soon as validation passes,
    /// which means rejected submissions still count against the window.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::InvalidInput`] for empty or oversized text,
    /// [`VoxcastError::RateLimited`] when the account's window is exhausted,
    /// [`VoxcastError::AccountNotFound`] for an unknown account,
    /// [`VoxcastError::BackendNotEntitled`] when the plan has no access to
    /// the backend, [`VoxcastError::QuotaExceeded`] when today's allowance
    /// is used up, and [`VoxcastError::QueueSaturated`] when the queue is
    /// full.
    pub async fn submit(
        &self,
        account_id: &AccountId,
        backend: BackendKind,
        text: &str,
        params: VoiceParams,
    ) -> VoxcastResult<JobHandle> {
        if self.queue.is_closed() {
            return Err(VoxcastError::invalid_input(
                "Synthesis service is shut down",
            ));
        }
        self.validate_text(text)?;
        self.rate_limiter.allow(account_id)?;
        let plan = self.accounts.plan(account_id).await?;
        self.ledger.check(account_id, backend, plan)?;
        let permit = self.queue.reserve()?;

        let job = Job::new(account_id.clone(), backend, text.to_string(), params);
        let job_id = self.store.create(job);
        permit.send(job_id);
        debug!("Accepted job {job_id} for account '{account_id}' on the {backend} backend");

        Ok(JobHandle { job_id, backend })
    }

    /// Read the current status of a job
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::JobNotFound`] if no job with this id exists.
    pub fn poll(&self, job_id: &JobId) -> VoxcastResult<JobSnapshot> {
        self.store.snapshot(job_id)
    }

    /// Wait until a job reaches a terminal status
    ///
    /// A job that ends in `Failed` still resolves to `Ok` with the failure
    /// captured in the snapshot; the error path is reserved for the wait
    /// itself timing out.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::JobNotFound`] if no job with this id exists
    /// and [`VoxcastError::Timeout`] if the job is still pending when
    /// `timeout` elapses.
    pub async fn await_completion(
        &self,
        job_id: &JobId,
        timeout: Duration,
    ) -> VoxcastResult<JobSnapshot> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.store.snapshot(job_id)?;
            if snapshot.is_terminal() {
                return Ok(snapshot);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(VoxcastError::timeout(format!(
                    "Job {job_id} still {} after {timeout:?}",
                    snapshot.status
                )));
            }
            tokio::time::sleep(COMPLETION_POLL_INTERVAL).await;
        }
    }

    /// Cancel a job that has not started running
    ///
    /// Returns `true` if the job was still queued and is now failed with a
    /// cancellation marker, `false` if it had already been claimed by a
    /// worker or reached a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::JobNotFound`] if no job with this id exists.
    pub fn cancel(&self, job_id: &JobId) -> VoxcastResult<bool> {
        let cancelled = self.store.update(job_id, Job::cancel)?;
        if cancelled {
            debug!("Cancelled job {job_id}");
        }
        Ok(cancelled)
    }

    /// Today's recorded usage per backend for an account
    #[must_use]
    pub fn usage_today(&self, account_id: &AccountId) -> HashMap<BackendKind, u32> {
        self.ledger.usage_today(account_id)
    }

    /// Voices available for synthesis, sorted by name
    #[must_use]
    pub fn available_voices(&self) -> Vec<Voice> {
        self.catalog.all_voices()
    }

    /// The voice catalog backing this service
    #[must_use]
    pub const fn voice_catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    /// The account store backing this service
    #[must_use]
    pub fn account_store(&self) -> Arc<dyn AccountStore> {
        Arc::clone(&self.accounts)
    }

    /// The active configuration
    #[must_use]
    pub const fn get_config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Number of dispatcher workers configured for this service
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Number of jobs currently waiting in the queue
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Whether the service is still accepting submissions
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.queue.is_closed()
    }

    /// Current counters for the service
    #[must_use]
    pub fn get_stats(&self) -> ServiceStats {
        ServiceStats {
            queue_depth: self.queue.depth(),
            queue_capacity: self.queue.capacity(),
            worker_count: self.config.worker_count,
            job_count: self.store.len(),
            registered_backends: self.backends.kinds(),
        }
    }

    /// Stop accepting submissions and wait for the workers to finish
    ///
    /// The queue is closed first, so workers drain the jobs that were already
    /// accepted before exiting. Calling `shutdown` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Timeout`] if a worker is still busy when
    /// `timeout` elapses; its task is aborted in that case.
    pub async fn shutdown(&self, timeout: Duration) -> VoxcastResult<()> {
        info!("Shutting down synthesis service");
        self.queue.close();
        let dispatcher = self.dispatcher.lock().take();
        match dispatcher {
            Some(dispatcher) => dispatcher.shutdown(timeout).await,
            None => {
                debug!("Synthesis service was already shut down");
                Ok(())
            }
        }
    }

    fn validate_text(&self, text: &str) -> VoxcastResult<()> {
        if text.trim().is_empty() {
            return Err(VoxcastError::invalid_input("Text cannot be empty"));
        }
        let length = text.chars().count();
        if length > self.config.max_text_length {
            return Err(VoxcastError::invalid_input(format!(
                "Text length {} exceeds maximum of {}",
                length, self.config.max_text_length
            )));
        }
        Ok(())
    }
}
