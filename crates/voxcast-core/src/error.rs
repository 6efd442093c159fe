//! Error types for the Voxcast synthesis queue.

use crate::account::{AccountId, PlanTier};
use crate::backend::BackendKind;
use crate::job::JobId;
use std::time::Duration;

/// Result type alias for Voxcast operations
pub type VoxcastResult<T> = Result<T, VoxcastError>;

/// Main error type for Voxcast synthesis queue operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VoxcastError {
    /// Too many submissions inside the current rate-limit window
    #[error("Rate limit exceeded; retry after {retry_after:?}")]
    RateLimited {
        /// Suggested backoff before the next submission attempt
        retry_after: Duration,
    },

    /// Daily quota for this account and backend is exhausted
    #[error("Daily quota for the {backend} backend reached (limit {limit})")]
    QuotaExceeded {
        /// Backend whose daily limit was hit
        backend: BackendKind,
        /// The configured daily limit
        limit: u32,
    },

    /// The account's plan does not include this backend at all
    #[error("The {plan} plan does not include the {backend} backend")]
    BackendNotEntitled {
        /// Backend the caller asked for
        backend: BackendKind,
        /// Plan that excludes it
        plan: PlanTier,
    },

    /// The job queue is at capacity
    #[error("Synthesis queue is full (capacity {capacity})")]
    QueueSaturated {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Invalid input error
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// Account lookup failed in the account store
    #[error("Account '{account_id}' not found")]
    AccountNotFound {
        /// The account id that was not found
        account_id: AccountId,
    },

    /// Job lookup failed (unknown id, or the record was evicted)
    #[error("Job '{job_id}' not found")]
    JobNotFound {
        /// The job id that was not found
        job_id: JobId,
    },

    /// A synthesis backend returned an error
    #[error("Synthesis failed: {message}")]
    SynthesisFailed {
        /// Error message describing the backend failure
        message: String,
    },

    /// Timeout error
    #[error("Operation timed out: {message}")]
    Timeout {
        /// Error message describing the timeout
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },
}

impl VoxcastError {
    /// Create a new rate-limited error
    #[must_use]
    pub const fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a new quota-exceeded error
    #[must_use]
    pub const fn quota_exceeded(backend: BackendKind, limit: u32) -> Self {
        Self::QuotaExceeded { backend, limit }
    }

    /// Create a new not-entitled error
    #[must_use]
    pub const fn not_entitled(backend: BackendKind, plan: PlanTier) -> Self {
        Self::BackendNotEntitled { backend, plan }
    }

    /// Create a new queue-saturated error
    #[must_use]
    pub const fn queue_saturated(capacity: usize) -> Self {
        Self::QueueSaturated { capacity }
    }

    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new account-not-found error
    #[must_use]
    pub fn account_not_found(account_id: impl Into<AccountId>) -> Self {
        Self::AccountNotFound {
            account_id: account_id.into(),
        }
    }

    /// Create a new job-not-found error
    #[must_use]
    pub const fn job_not_found(job_id: JobId) -> Self {
        Self::JobNotFound { job_id }
    }

    /// Create a new synthesis error
    #[must_use]
    pub fn synthesis<S: Into<String>>(message: S) -> Self {
        Self::SynthesisFailed {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    #[must_use]
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if this error is transient and worth retrying
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::QueueSaturated { .. } | Self::Timeout { .. }
        )
    }

    /// Check if this error is due to invalid caller input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::AccountNotFound { .. } | Self::JobNotFound { .. }
        )
    }

    /// Check if this error was raised at admission time, before a job record
    /// existed
    #[must_use]
    pub const fn is_admission_error(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::QuotaExceeded { .. }
                | Self::BackendNotEntitled { .. }
                | Self::QueueSaturated { .. }
                | Self::InvalidInput { .. }
                | Self::AccountNotFound { .. }
        )
    }

    /// Suggested backoff for rate-limited submissions
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Get the error category for logging/metrics
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limit",
            Self::QuotaExceeded { .. } => "quota",
            Self::BackendNotEntitled { .. } => "entitlement",
            Self::QueueSaturated { .. } => "queue",
            Self::InvalidInput { .. } => "input",
            Self::AccountNotFound { .. } => "account",
            Self::JobNotFound { .. } => "job",
            Self::SynthesisFailed { .. } => "synthesis",
            Self::Timeout { .. } => "timeout",
            Self::Configuration { .. } => "configuration",
        }
    }
}

// Convert from common error types
impl From<tokio::time::error::Elapsed> for VoxcastError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::timeout(format!("Operation timed out: {err}"))
    }
}

impl From<std::io::Error> for VoxcastError {
    fn from(err: std::io::Error) -> Self {
        Self::configuration(err.to_string())
    }
}

impl From<toml::de::Error> for VoxcastError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("TOML parse error: {err}"))
    }
}
