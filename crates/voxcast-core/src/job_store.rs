//! In-memory job records with atomic read-modify-write.
//!
//! All mutation goes through [`JobStore::update`], which runs the caller's
//! closure under the write lock. Combined with the transition methods on
//! [`Job`], that is what makes a claim race between a worker and a
//! cancellation resolve to exactly one winner.

use crate::error::{VoxcastError, VoxcastResult};
use crate::job::{Job, JobId, JobSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Job id to record map, the only post-submit lookup surface
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly admitted job, returning its id
    pub fn create(&self, job: Job) -> JobId {
        let id = job.id;
        self.jobs.write().insert(id, job);
        id
    }

    /// Fetch a copy of the full job record
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::JobNotFound`] for ids this store never saw.
    pub fn get(&self, job_id: &JobId) -> VoxcastResult<Job> {
        self.jobs
            .read()
            .get(job_id)
            .cloned()
            .ok_or_else(|| VoxcastError::job_not_found(*job_id))
    }

    /// Fetch the caller-facing view of a job
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::JobNotFound`] for unknown ids.
    pub fn snapshot(&self, job_id: &JobId) -> VoxcastResult<JobSnapshot> {
        self.jobs
            .read()
            .get(job_id)
            .map(Job::snapshot)
            .ok_or_else(|| VoxcastError::job_not_found(*job_id))
    }

    /// Run a mutation against one job under the write lock
    ///
    /// The closure's return value passes through, so callers can observe
    /// whether a state transition applied.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::JobNotFound`] for unknown ids.
    pub fn update<F, R>(&self, job_id: &JobId, f: F) -> VoxcastResult<R>
    where
        F: FnOnce(&mut Job) -> R,
    {
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| VoxcastError::job_not_found(*job_id))?;
        Ok(f(job))
    }

    /// Number of job records held
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Check whether the store holds no jobs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
