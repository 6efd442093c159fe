//! Account identity, plan tiers, and the account store port.
//!
//! The queue itself never owns account data. It talks to an [`AccountStore`]
//! implementation: [`MemoryAccountStore`] for tests and single-process
//! deployments, or an adapter over an external user database in production.

use crate::backend::BackendKind;
use crate::error::{VoxcastError, VoxcastResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Opaque identifier for a billing account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account id from any string-like value
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Subscription tier attached to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Entry tier with a small daily allowance on the fast backend only
    Free,
    /// Paid tier with fast and mid backend access
    Basic,
    /// Top tier with unmetered fast/mid access and a premium allowance
    Pro,
}

impl PlanTier {
    /// Get the tier name as used in configuration files and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
        }
    }

    /// All known tiers, lowest first
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Free, Self::Basic, Self::Pro]
    }
}

impl Default for PlanTier {
    fn default() -> Self {
        Self::Free
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = VoxcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            _ => Err(VoxcastError::invalid_input(format!(
                "Unknown plan tier: {s}"
            ))),
        }
    }
}

/// A single account record: plan tier plus cumulative per-backend usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// The account's identifier
    pub id: AccountId,
    /// The subscription tier the account is on
    pub plan: PlanTier,
    /// Lifetime count of successful syntheses, per backend
    pub usage: HashMap<BackendKind, u64>,
}

impl Account {
    /// Create a new account on the given plan with zero usage
    pub fn new(id: impl Into<AccountId>, plan: PlanTier) -> Self {
        Self {
            id: id.into(),
            plan,
            usage: HashMap::new(),
        }
    }

    /// Lifetime successful syntheses on one backend
    #[must_use]
    pub fn usage_for(&self, backend: BackendKind) -> u64 {
        self.usage.get(&backend).copied().unwrap_or(0)
    }

    /// Lifetime successful syntheses across all backends
    #[must_use]
    pub fn total_usage(&self) -> u64 {
        self.usage.values().sum()
    }
}

/// Port to whatever system owns account and subscription data.
///
/// Lookups are async because production implementations sit in front of an
/// external database. Errors from `increment_usage` are logged and swallowed
/// by the dispatcher; a billing hiccup must not fail an already completed job.
#[async_trait]
pub trait AccountStore: Send + Sync + std::fmt::Debug {
    /// Resolve the plan tier for an account
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::AccountNotFound`] if the account is unknown.
    async fn plan(&self, account_id: &AccountId) -> VoxcastResult<PlanTier>;

    /// Fetch the full account record
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::AccountNotFound`] if the account is unknown.
    async fn get_account(&self, account_id: &AccountId) -> VoxcastResult<Account>;

    /// Record one successful synthesis against the account's lifetime counter
    /// for the given backend
    ///
    /// Returns the new counter value for that backend.
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::AccountNotFound`] if the account is unknown.
    async fn increment_usage(
        &self,
        account_id: &AccountId,
        backend: BackendKind,
    ) -> VoxcastResult<u64>;

    /// Move the account to a different plan tier
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::AccountNotFound`] if the account is unknown.
    async fn set_plan(&self, account_id: &AccountId, plan: PlanTier) -> VoxcastResult<()>;
}

/// Account store backed by a process-local map
///
/// Suitable for tests and single-node deployments where accounts are loaded
/// at startup.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl MemoryAccountStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an account
    pub fn insert(&self, id: impl Into<AccountId>, plan: PlanTier) {
        let account = Account::new(id, plan);
        debug!("Registering account '{}' on {} plan", account.id, plan);
        self.accounts.write().insert(account.id.clone(), account);
    }

    /// Look up the lifetime usage counter for one backend, if the account
    /// exists
    #[must_use]
    pub fn usage(&self, account_id: &AccountId, backend: BackendKind) -> Option<u64> {
        self.accounts
            .read()
            .get(account_id)
            .map(|a| a.usage_for(backend))
    }

    /// Number of registered accounts
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Check whether the store has no accounts
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn plan(&self, account_id: &AccountId) -> VoxcastResult<PlanTier> {
        self.accounts
            .read()
            .get(account_id)
            .map(|a| a.plan)
            .ok_or_else(|| VoxcastError::account_not_found(account_id.clone()))
    }

    async fn get_account(&self, account_id: &AccountId) -> VoxcastResult<Account> {
        self.accounts
            .read()
            .get(account_id)
            .cloned()
            .ok_or_else(|| VoxcastError::account_not_found(account_id.clone()))
    }

    async fn increment_usage(
        &self,
        account_id: &AccountId,
        backend: BackendKind,
    ) -> VoxcastResult<u64> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| VoxcastError::account_not_found(account_id.clone()))?;
        let count = account.usage.entry(backend).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn set_plan(&self, account_id: &AccountId, plan: PlanTier) -> VoxcastResult<()> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| VoxcastError::account_not_found(account_id.clone()))?;
        debug!("Moving account '{account_id}' to {plan} plan");
        account.plan = plan;
        Ok(())
    }
}
