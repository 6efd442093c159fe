//! # Voxcast Core
//!
//! Usage-metered text-to-speech job queue with pluggable synthesis backends.
//!
//! ## Features
//!
//! - Admission pipeline checked before any work is queued: input validation,
//!   sliding-window rate limiting, plan entitlements and daily quotas
//! - Bounded job queue drained by a pool of dispatcher workers
//! - Synthesis backends in three cost classes (fast, mid, premium) behind a
//!   common adapter trait
//! - Job lifecycle tracking with polling, awaiting and cancellation
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use voxcast_core::{
//!     AccountId, BackendKind, BackendRegistry, MemoryAccountStore, PlanTier,
//!     StubBackend, SynthesisService, VoiceParams, VoxcastResult,
//! };
//!
//! #[tokio::main]
//! async fn main() -> VoxcastResult<()> {
//!     let accounts = Arc::new(MemoryAccountStore::new());
//!     accounts.insert("alice", PlanTier::Pro);
//!
//!     let mut backends = BackendRegistry::new();
//!     backends.register(Arc::new(StubBackend::new(BackendKind::Fast)));
//!
//!     let service = SynthesisService::new(accounts, backends)?;
//!     let handle = service
//!         .submit(
//!             &AccountId::from("alice"),
//!             BackendKind::Fast,
//!             "Hello, world!",
//!             VoiceParams::default(),
//!         )
//!         .await?;
//!
//!     let finished = service
//!         .await_completion(&handle.job_id, Duration::from_secs(5))
//!         .await?;
//!     println!("job {} finished as {}", handle.job_id, finished.status);
//!
//!     service.shutdown(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod account;
pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod job_queue;
pub mod job_store;
pub mod quota;
pub mod rate_limiter;
pub mod service;
pub mod voice;

// Re-export main types for convenience
pub use account::{Account, AccountId, AccountStore, MemoryAccountStore, PlanTier};
pub use backend::{BackendKind, BackendRegistry, StubBackend, SynthesisBackend};
pub use dispatcher::{Dispatcher, WorkerContext};
pub use error::{VoxcastError, VoxcastResult};
pub use job::{AudioHandle, FailureKind, Job, JobId, JobSnapshot, JobStatus};
pub use job_queue::{JobQueue, QueuePermit};
pub use job_store::JobStore;
pub use quota::{PlanCatalog, PlanLimits, QuotaLedger, UNLIMITED};
pub use rate_limiter::RateLimiter;
pub use service::{JobHandle, ServiceConfig, ServiceStats, SynthesisService};
pub use voice::{Gender, Voice, VoiceCatalog, VoiceParams};

/// Version information for the voxcast-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default voice used when a submission does not pick one (Hindi, male)
pub const DEFAULT_VOICE_ID: &str = "hi-IN-MadhurNeural";

/// Maximum text length for synthesis (to prevent unbounded jobs)
pub const MAX_TEXT_LENGTH: usize = 10_000;

/// Default number of dispatcher workers
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// Default capacity of the job queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default width of the rate-limit window in seconds (one minute)
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Default number of submissions allowed per window
pub const DEFAULT_RATE_LIMIT_MAX: usize = 5;

/// Default deadline for a single backend synthesis call in seconds
pub const DEFAULT_SYNTHESIS_TIMEOUT_SECS: u64 = 30;
