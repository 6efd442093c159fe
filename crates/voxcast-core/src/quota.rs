//! Plan limits and the per-day usage ledger.
//!
//! Counts are keyed by account, backend, and UTC day. A new day means a new
//! key starting at zero, so there is no reset step to run or to get wrong.
//! `check` never increments; only the dispatcher records usage, and only for
//! jobs that actually produced audio.

use crate::account::{AccountId, PlanTier};
use crate::backend::BackendKind;
use crate::error::{VoxcastError, VoxcastResult};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Daily limit value meaning no cap
pub const UNLIMITED: i32 = -1;

static DEFAULT_LIMITS: Lazy<HashMap<PlanTier, PlanLimits>> = Lazy::new(|| {
    HashMap::from([
        (PlanTier::Free, PlanLimits::new(3, 0, 0)),
        (PlanTier::Basic, PlanLimits::new(50, 20, 0)),
        (PlanTier::Pro, PlanLimits::new(UNLIMITED, UNLIMITED, 25)),
    ])
});

/// Per-backend daily limits for one plan tier.
///
/// `-1` means unlimited, `0` means the backend is not included in the plan,
/// any positive value caps successful syntheses per UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Daily limit on the fast backend
    pub fast: i32,
    /// Daily limit on the mid backend
    pub mid: i32,
    /// Daily limit on the premium backend
    pub premium: i32,
}

impl PlanLimits {
    /// Limits granting no backend access at all
    pub const NONE: Self = Self::new(0, 0, 0);

    /// Create limits from per-backend values
    #[must_use]
    pub const fn new(fast: i32, mid: i32, premium: i32) -> Self {
        Self { fast, mid, premium }
    }

    /// The limit that applies to one backend
    #[must_use]
    pub const fn limit_for(&self, backend: BackendKind) -> i32 {
        match backend {
            BackendKind::Fast => self.fast,
            BackendKind::Mid => self.mid,
            BackendKind::Premium => self.premium,
        }
    }

    /// Validate the limit values
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Configuration`] when a limit is below `-1`.
    pub fn validate(&self) -> VoxcastResult<()> {
        for backend in BackendKind::all() {
            let limit = self.limit_for(backend);
            if limit < UNLIMITED {
                return Err(VoxcastError::configuration(format!(
                    "Daily limit for {backend} must be -1, 0, or positive, got {limit}"
                )));
            }
        }
        Ok(())
    }
}

/// Daily limits for every plan tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanCatalog {
    limits: HashMap<PlanTier, PlanLimits>,
}

impl PlanCatalog {
    /// Create the stock catalog
    #[must_use]
    pub fn new() -> Self {
        Self {
            limits: DEFAULT_LIMITS.clone(),
        }
    }

    /// Override the limits for one tier
    #[must_use]
    pub fn with_limits(mut self, tier: PlanTier, limits: PlanLimits) -> Self {
        self.limits.insert(tier, limits);
        self
    }

    /// The limits for a tier; a tier missing from the catalog grants nothing
    #[must_use]
    pub fn limits_for(&self, tier: PlanTier) -> PlanLimits {
        self.limits.get(&tier).copied().unwrap_or(PlanLimits::NONE)
    }

    /// Validate that every tier is present with sane limits
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::Configuration`] when a tier is missing or a
    /// limit value is out of range.
    pub fn validate(&self) -> VoxcastResult<()> {
        for tier in PlanTier::all() {
            let Some(limits) = self.limits.get(&tier) else {
                return Err(VoxcastError::configuration(format!(
                    "Plan catalog is missing the {tier} tier"
                )));
            };
            limits.validate()?;
        }
        Ok(())
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new()
    }
}

type LedgerKey = (AccountId, BackendKind, NaiveDate);

/// Per-account, per-backend, per-day usage ledger
#[derive(Debug)]
pub struct QuotaLedger {
    catalog: PlanCatalog,
    counts: Mutex<HashMap<LedgerKey, u32>>,
}

impl QuotaLedger {
    /// Create a ledger enforcing the given catalog
    #[must_use]
    pub fn new(catalog: PlanCatalog) -> Self {
        Self {
            catalog,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// The catalog this ledger enforces
    #[must_use]
    pub const fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Check whether the account may run one more job on this backend today
    ///
    /// Never increments anything.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::BackendNotEntitled`] when the plan excludes
    /// the backend, or [`VoxcastError::QuotaExceeded`] when today's limit is
    /// used up.
    pub fn check(
        &self,
        account_id: &AccountId,
        backend: BackendKind,
        plan: PlanTier,
    ) -> VoxcastResult<()> {
        self.check_on(account_id, backend, plan, utc_today())
    }

    /// Record one successful synthesis, returning today's new count
    pub fn record_usage(&self, account_id: &AccountId, backend: BackendKind) -> u32 {
        self.record_usage_on(account_id, backend, utc_today())
    }

    /// Today's successful syntheses per backend for an account
    #[must_use]
    pub fn usage_today(&self, account_id: &AccountId) -> HashMap<BackendKind, u32> {
        self.usage_on(account_id, utc_today())
    }

    fn check_on(
        &self,
        account_id: &AccountId,
        backend: BackendKind,
        plan: PlanTier,
        day: NaiveDate,
    ) -> VoxcastResult<()> {
        let limit = self.catalog.limits_for(plan).limit_for(backend);
        if limit == 0 {
            return Err(VoxcastError::not_entitled(backend, plan));
        }
        if limit < 0 {
            return Ok(());
        }

        let key = (account_id.clone(), backend, day);
        let used = self.counts.lock().get(&key).copied().unwrap_or(0);
        if used >= limit.unsigned_abs() {
            debug!(
                "Quota exhausted for account '{account_id}' on {backend}: {used}/{limit} today"
            );
            return Err(VoxcastError::quota_exceeded(backend, limit.unsigned_abs()));
        }
        Ok(())
    }

    fn record_usage_on(&self, account_id: &AccountId, backend: BackendKind, day: NaiveDate) -> u32 {
        let key = (account_id.clone(), backend, day);
        let mut counts = self.counts.lock();
        let count = counts.entry(key).or_insert(0);
        *count += 1;
        debug!("Recorded usage for account '{account_id}' on {backend}: {count} today");
        *count
    }

    fn usage_on(&self, account_id: &AccountId, day: NaiveDate) -> HashMap<BackendKind, u32> {
        let counts = self.counts.lock();
        BackendKind::all()
            .into_iter()
            .map(|backend| {
                let key = (account_id.clone(), backend, day);
                (backend, counts.get(&key).copied().unwrap_or(0))
            })
            .collect()
    }
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}
