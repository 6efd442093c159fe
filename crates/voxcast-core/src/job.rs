//! Job records and their lifecycle state machine.
//!
//! Status moves in one direction only: `Queued` to `Running` to one of the
//! terminal states, or `Queued` straight to `Failed` when a queued job is
//! cancelled. The transition methods on [`Job`] are the only mutators; each
//! returns whether the transition applied, so racing callers can detect that
//! they lost without observing a torn state.

use crate::account::AccountId;
use crate::backend::BackendKind;
use crate::error::VoxcastError;
use crate::voice::VoiceParams;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a synthesis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random job id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = VoxcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| VoxcastError::invalid_input(format!("Invalid job id '{s}': {e}")))
    }
}

/// Cheaply cloneable handle over synthesized audio bytes.
///
/// The handle says nothing about encoding or persistence; it is whatever the
/// backend produced. Cloning shares the same allocation.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioHandle(Arc<[u8]>);

impl AudioHandle {
    /// Wrap synthesized bytes in a shareable handle
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    /// Length of the audio payload in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read access to the audio bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for AudioHandle {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

// Keep log output readable; the payload can be megabytes.
impl fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioHandle({} bytes)", self.0.len())
    }
}

/// Why a job ended in the failed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend adapter returned an error
    SynthesisFailed {
        /// The adapter's error message
        message: String,
    },
    /// The backend did not answer within the per-job deadline
    SynthesisTimeout {
        /// The deadline that elapsed
        deadline: Duration,
    },
    /// The job was cancelled while still queued
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SynthesisFailed { message } => write!(f, "synthesis failed: {message}"),
            Self::SynthesisTimeout { deadline } => {
                write!(f, "synthesis timed out after {deadline:?}")
            }
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle state of a job, carrying the result or failure payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted and waiting in the queue
    Queued,
    /// Claimed by a worker, synthesis in flight
    Running,
    /// Synthesis completed; audio is available
    Succeeded {
        /// The synthesized audio
        audio: AudioHandle,
    },
    /// The job will never produce audio
    Failed {
        /// What went wrong
        kind: FailureKind,
    },
}

impl JobStatus {
    /// Check whether this status is terminal
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Check whether the job is still waiting in the queue
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }

    /// Check whether a worker is currently synthesizing the job
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check whether the job produced audio
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Check whether the job failed
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Get the status name for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A synthesis job record as held by the job store
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique job identifier, assigned at submission
    pub id: JobId,
    /// The account the job bills against
    pub account_id: AccountId,
    /// The backend that will synthesize it
    pub backend: BackendKind,
    /// The text payload to synthesize
    pub text: String,
    /// Voice parameters passed through to the backend untouched
    pub params: VoiceParams,
    /// Current lifecycle state
    pub status: JobStatus,
    /// When the job was accepted
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state, if it has
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job
    #[must_use]
    pub fn new(
        account_id: AccountId,
        backend: BackendKind,
        text: String,
        params: VoiceParams,
    ) -> Self {
        Self {
            id: JobId::new(),
            account_id,
            backend,
            text,
            params,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Claim the job for execution
    ///
    /// Returns `false` if the job is no longer queued, in which case nothing
    /// changes and the caller must not process it.
    pub fn start_running(&mut self) -> bool {
        if self.status.is_queued() {
            self.status = JobStatus::Running;
            true
        } else {
            false
        }
    }

    /// Record a successful synthesis
    ///
    /// Applies only to a running job; returns whether it applied.
    pub fn succeed(&mut self, audio: AudioHandle) -> bool {
        if self.status.is_running() {
            self.status = JobStatus::Succeeded { audio };
            self.completed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Record a failed synthesis
    ///
    /// Applies only to a running job; returns whether it applied.
    pub fn fail(&mut self, kind: FailureKind) -> bool {
        if self.status.is_running() {
            self.status = JobStatus::Failed { kind };
            self.completed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Cancel a job that is still waiting in the queue
    ///
    /// Returns `false` if a worker already claimed it or it is terminal.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_queued() {
            self.status = JobStatus::Failed {
                kind: FailureKind::Cancelled,
            };
            self.completed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// The caller-facing view of this job
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            status: self.status.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// What `poll` returns: status with payloads plus timestamps.
///
/// Deliberately omits the input text and voice parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    /// The job's identifier
    pub id: JobId,
    /// Lifecycle state at the time of the poll
    pub status: JobStatus,
    /// When the job was accepted
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state, if it has
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// Check whether the job has reached a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The synthesized audio, if the job succeeded
    #[must_use]
    pub const fn audio(&self) -> Option<&AudioHandle> {
        match &self.status {
            JobStatus::Succeeded { audio } => Some(audio),
            _ => None,
        }
    }

    /// The failure, if the job failed
    #[must_use]
    pub const fn failure(&self) -> Option<&FailureKind> {
        match &self.status {
            JobStatus::Failed { kind } => Some(kind),
            _ => None,
        }
    }
}
