use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::detect::{CategoryResult, ClassificationUpdate};
use crate::error::ClassifyError;

use super::{ClassifierBackend, ClassifierStartContext, EngineMessage, TimeSource};

/// One scripted inference cycle for deterministic replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayCycle {
    #[serde(default)]
    pub results: Vec<CategoryResult>,
    #[serde(default)]
    pub latency_ms: f64,
    /// When set, the cycle delivers a fault instead of results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl ReplayCycle {
    pub fn with_results(results: Vec<CategoryResult>, latency_ms: f64) -> Self {
        Self {
            results,
            latency_ms,
            fault: None,
        }
    }

    pub fn with_fault(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            latency_ms: 0.0,
            fault: Some(message.into()),
        }
    }
}

/// Backend that plays a fixed cycle script into the dispatch queue.
///
/// Used by replay verification and tests. The script is delivered in
/// order as fast as the queue accepts it; afterwards the backend idles
/// in the running state until stopped. Stopping mid-script drops the
/// undelivered remainder; a restart replays the script from the
/// beginning.
pub struct ReplayBackend {
    script: Mutex<Vec<ReplayCycle>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ReplayBackend {
    pub fn new(script: Vec<ReplayCycle>) -> Self {
        Self {
            script: Mutex::new(script),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Replace the script used by the next start.
    pub fn set_script(&self, script: Vec<ReplayCycle>) {
        *self.script.lock().unwrap() = script;
    }
}

impl ClassifierBackend for ReplayBackend {
    fn start(&self, ctx: ClassifierStartContext) -> Result<(), ClassifyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ClassifyError::AlreadyRunning);
        }

        let script = self.script.lock().unwrap().clone();
        let events = ctx.events;
        let running = Arc::clone(&self.running);

        let handle = thread::spawn(move || {
            for cycle in script {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let message = match cycle.fault {
                    Some(message) => EngineMessage::Fault { message },
                    None => EngineMessage::Cycle(ClassificationUpdate {
                        results: cycle.results,
                        latency_ms: cycle.latency_ms,
                    }),
                };
                if events.blocking_send(message).is_err() {
                    break;
                }
            }
        });

        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), ClassifyError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ClassifyError::NotRunning);
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

/// Deterministic time source for replay runs.
///
/// Each call to `now()` advances by a fixed 10ms to guarantee monotonic
/// timestamps even when no real classifier is active.
pub struct StubTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(10, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
    }
}
