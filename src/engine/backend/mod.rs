//! Backend abstractions for the reusable engine core.

use std::time::Instant;

use tokio::sync::mpsc;

use crate::config::ClassifierParams;
use crate::detect::ClassificationUpdate;
use crate::error::ClassifyError;

/// Message a backend feeds into the single-consumer dispatch queue.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// One completed inference cycle
    Cycle(ClassificationUpdate),
    /// A classification failure; consumers clear their displayed results
    Fault { message: String },
}

/// Context provided to classifier backends when starting the engine.
///
/// This bundles the parameters and the dispatch queue sender the backend
/// needs to produce cycles without coupling it to higher-level code.
pub struct ClassifierStartContext {
    pub params: ClassifierParams,
    pub events: mpsc::Sender<EngineMessage>,
}

/// Trait implemented by classification backends.
///
/// Each backend owns its inference loop and feeds completed cycles into
/// the queue provided via [ClassifierStartContext]. Reconfiguration is
/// modeled as stop followed by start with fresh parameters, matching how
/// on-device interpreters are rebuilt.
pub trait ClassifierBackend: Send + Sync {
    fn start(&self, ctx: ClassifierStartContext) -> Result<(), ClassifyError>;
    fn stop(&self) -> Result<(), ClassifyError>;
}

/// Trait representing a monotonic time source used for event timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

mod replay;
pub use replay::{ReplayBackend, ReplayCycle, StubTimeSource};

mod synthetic;
pub use synthetic::SyntheticBackend;
