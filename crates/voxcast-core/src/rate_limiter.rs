//! Sliding-window rate limiting for job admission.
//!
//! Each account gets an independent window of recent admission instants.
//! State is process-local and lock-protected; it is lost on restart, which is
//! acceptable for a best-effort burst gate. The window uses
//! [`tokio::time::Instant`] so a paused test clock drives expiry.

use crate::account::AccountId;
use crate::error::{VoxcastError, VoxcastResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Per-account sliding-window admission gate
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_per_window: usize,
    windows: Mutex<HashMap<AccountId, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_per_window` admissions per account in
    /// any span of `window`
    #[must_use]
    pub fn new(window: Duration, max_per_window: usize) -> Self {
        Self {
            window,
            max_per_window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a submission for this account, recording it if
    /// admitted
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::RateLimited`] with a suggested backoff when
    /// the account already used its window.
    pub fn allow(&self, account_id: &AccountId) -> VoxcastResult<()> {
        self.allow_at(account_id, Instant::now())
    }

    fn allow_at(&self, account_id: &AccountId, now: Instant) -> VoxcastResult<()> {
        let mut windows = self.windows.lock();
        let stamps = windows.entry(account_id.clone()).or_default();

        // Drop stamps that have aged out of the window.
        while let Some(oldest) = stamps.front() {
            if now.duration_since(*oldest) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() >= self.max_per_window {
            let retry_after = stamps
                .front()
                .map_or(self.window, |oldest| (*oldest + self.window).duration_since(now));
            debug!(
                "Rate limit hit for account '{account_id}': {} in window, retry after {retry_after:?}",
                stamps.len()
            );
            return Err(VoxcastError::rate_limited(retry_after));
        }

        stamps.push_back(now);
        Ok(())
    }

    /// The configured window width
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// The configured admissions per window
    #[must_use]
    pub const fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    /// Number of accounts with a tracked window
    #[must_use]
    pub fn tracked_accounts(&self) -> usize {
        self.windows.lock().len()
    }
}
