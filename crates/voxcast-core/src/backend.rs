//! Synthesis backend kinds, the adapter trait, and the adapter registry.
//!
//! Dispatch is keyed on [`BackendKind`] from admission to execution; the
//! string forms exist only at the configuration edge. One adapter per engine
//! registers in a [`BackendRegistry`], and the dispatcher looks adapters up
//! by kind when a job comes off the queue.

use crate::error::{VoxcastError, VoxcastResult};
use crate::voice::VoiceParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The three interchangeable synthesis engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Fast, free-tier engine
    Fast,
    /// Mid-tier engine
    Mid,
    /// Premium neural engine
    Premium,
}

impl BackendKind {
    /// Get the kind name as used in configuration files and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Mid => "mid",
            Self::Premium => "premium",
        }
    }

    /// All backend kinds, cheapest first
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Fast, Self::Mid, Self::Premium]
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = VoxcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "mid" => Ok(Self::Mid),
            "premium" => Ok(Self::Premium),
            _ => Err(VoxcastError::invalid_input(format!(
                "Unknown backend kind: {s}"
            ))),
        }
    }
}

/// Capability every synthesis engine adapter implements.
///
/// Adapters own their engine clients and credentials. The dispatcher only
/// sees this seam and bounds each call with its own timeout, so adapters do
/// not need to enforce deadlines themselves.
#[async_trait]
pub trait SynthesisBackend: Send + Sync + fmt::Debug {
    /// Which backend kind this adapter serves
    fn kind(&self) -> BackendKind;

    /// Engine name for logging
    fn name(&self) -> &str;

    /// Convert text to audio bytes
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::SynthesisFailed`] when the engine rejects the
    /// request or fails mid-synthesis.
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> VoxcastResult<Vec<u8>>;
}

/// Registry mapping backend kinds to their adapters
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn SynthesisBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own kind, replacing any previous one
    pub fn register(&mut self, backend: Arc<dyn SynthesisBackend>) {
        let kind = backend.kind();
        debug!("Registering {} backend adapter '{}'", kind, backend.name());
        self.backends.insert(kind, backend);
    }

    /// Look up the adapter for a backend kind
    #[must_use]
    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn SynthesisBackend>> {
        self.backends.get(&kind).cloned()
    }

    /// Check whether an adapter is registered for a kind
    #[must_use]
    pub fn contains(&self, kind: BackendKind) -> bool {
        self.backends.contains_key(&kind)
    }

    /// Registered kinds, cheapest first
    #[must_use]
    pub fn kinds(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<BackendKind> = self.backends.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Number of registered adapters
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Check whether no adapters are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// In-process adapter with configurable latency and failure.
///
/// Stands in for a real engine in tests and in embedders that have not wired
/// their engines yet. The payload is deterministic: a header naming the
/// engine and voice, followed by the input text bytes.
#[derive(Debug)]
pub struct StubBackend {
    kind: BackendKind,
    engine_name: String,
    latency: Duration,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl StubBackend {
    /// Create a stub adapter for the given kind
    #[must_use]
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            engine_name: format!("stub-{kind}"),
            latency: Duration::ZERO,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Add artificial synthesis latency
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every synthesis call fail with the given message
    #[must_use]
    pub fn with_failure<S: Into<String>>(mut self, message: S) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// How many synthesis calls this adapter has received
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisBackend for StubBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.engine_name
    }

    async fn synthesize(&self, text: &str, params: &VoiceParams) -> VoxcastResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(message) = &self.fail_with {
            return Err(VoxcastError::synthesis(message.clone()));
        }

        let mut audio = format!(
            "{}|{}|{}|{}|",
            self.engine_name, params.voice_id, params.rate, params.pitch
        )
        .into_bytes();
        audio.extend_from_slice(text.as_bytes());
        Ok(audio)
    }
}
