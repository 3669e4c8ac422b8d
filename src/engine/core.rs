//! SentryHandle: reusable sound-event orchestration layer.
//!
//! The handle owns the classifier backend, the single-consumer dispatch
//! queue, and the per-event toggles, and exposes a `ClassifierPatch`
//! command pipeline shared across CLI and HTTP entry points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::config::{ClassifierParams, SentryConfig};
use crate::detect::{
    evaluate, ClassificationUpdate, ClassifierFault, EventKind, EventToggles,
    NotificationCounter, WatchTable,
};
use crate::engine::backend::{
    ClassifierBackend, ClassifierStartContext, EngineMessage, SyntheticBackend, SystemTimeSource,
    TimeSource,
};
use crate::error::{log_classify_error, log_notify_error, ClassifyError};
use crate::managers::BroadcastChannelManager;
use crate::notify::{LogSink, NotificationRequest, NotificationSink};
use crate::telemetry::{self, DiagnosticError, LifecyclePhase};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// Patch describing classifier parameter updates to apply to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierPatch {
    #[serde(default)]
    pub overlap_position: Option<usize>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl ClassifierPatch {
    pub fn is_empty(&self) -> bool {
        self.overlap_position.is_none()
            && self.max_results.is_none()
            && self.score_threshold.is_none()
            && self.num_threads.is_none()
    }
}

/// Telemetry event emitted by the engine core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp_ms: u64,
    pub kind: TelemetryEventKind,
    pub detail: Option<String>,
}

/// Types of telemetry events supported by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEventKind {
    EngineStarted { params: ClassifierParams },
    EngineStopped,
    ParamsChanged { params: ClassifierParams },
    TogglesChanged { toggles: EventToggles },
    Warning,
}

/// SentryHandle orchestrates the classifier pipeline and shared channels.
pub struct SentryHandle {
    config: Arc<RwLock<SentryConfig>>,
    backend: Arc<dyn ClassifierBackend>,
    sink: Arc<dyn NotificationSink>,
    watch_table: Arc<WatchTable>,
    toggles: Arc<RwLock<EventToggles>>,
    pub(crate) broadcasts: BroadcastChannelManager,
    update_tx: broadcast::Sender<ClassificationUpdate>,
    notification_tx: broadcast::Sender<NotificationRequest>,
    fault_tx: broadcast::Sender<ClassifierFault>,
    telemetry_tx: broadcast::Sender<TelemetryEvent>,
    events_tx: mpsc::Sender<EngineMessage>,
    events_rx: Arc<Mutex<mpsc::Receiver<EngineMessage>>>,
    command_tx: mpsc::Sender<ClassifierPatch>,
    command_rx: Arc<Mutex<mpsc::Receiver<ClassifierPatch>>>,
    dispatch_worker_started: AtomicBool,
    command_worker_started: AtomicBool,
    engine_running: Arc<AtomicBool>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl SentryHandle {
    /// Create a new SentryHandle with the bundled configuration and the
    /// synthetic backend plus logging sink used by desktop runs.
    pub fn new() -> Self {
        let config = SentryConfig::load();
        let backend = Arc::new(SyntheticBackend::new(config.synthetic.clone()));
        Self::with_parts(
            config,
            backend,
            Arc::new(LogSink::new()),
            Arc::new(SystemTimeSource),
        )
    }

    /// Assemble a handle from explicit parts. Replay tooling and tests
    /// inject scripted backends and recording sinks here.
    pub fn with_parts(
        config: SentryConfig,
        backend: Arc<dyn ClassifierBackend>,
        sink: Arc<dyn NotificationSink>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let queue_capacity = config.dispatch.queue_capacity.max(1);
        let config = Arc::new(RwLock::new(config));

        let broadcasts = BroadcastChannelManager::new();
        let update_tx = broadcasts.init_updates();
        let notification_tx = broadcasts.init_notifications();
        let fault_tx = broadcasts.init_faults();
        let (telemetry_tx, _) = broadcast::channel(128);
        let (events_tx, events_rx) = mpsc::channel(queue_capacity);
        let (command_tx, command_rx) = mpsc::channel(64);

        Self {
            config,
            backend,
            sink,
            watch_table: Arc::new(WatchTable::default()),
            toggles: Arc::new(RwLock::new(EventToggles::default())),
            broadcasts,
            update_tx,
            notification_tx,
            fault_tx,
            telemetry_tx,
            events_tx,
            events_rx: Arc::new(Mutex::new(events_rx)),
            command_tx,
            command_rx: Arc::new(Mutex::new(command_rx)),
            dispatch_worker_started: AtomicBool::new(false),
            command_worker_started: AtomicBool::new(false),
            engine_running: Arc::new(AtomicBool::new(false)),
            time_source,
            start_instant: Instant::now(),
        }
    }

    fn init_dispatch_worker(&self) {
        if self
            .dispatch_worker_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let events_rx = Arc::clone(&self.events_rx);
        let events_tx = self.events_tx.clone();
        let sink = Arc::clone(&self.sink);
        let watch_table = Arc::clone(&self.watch_table);
        let toggles = Arc::clone(&self.toggles);
        let update_tx = self.update_tx.clone();
        let notification_tx = self.notification_tx.clone();
        let fault_tx = self.fault_tx.clone();
        let time_source = Arc::clone(&self.time_source);
        let start_instant = self.start_instant;

        // The worker owns the notification counter for the life of the
        // handle; slot IDs keep advancing across engine stop/start cycles.
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime for dispatch worker");

            rt.block_on(async move {
                let mut counter = NotificationCounter::new();

                loop {
                    let message = {
                        let mut guard = events_rx.lock().await;
                        guard.recv().await
                    };

                    let now_ms = time_source
                        .now()
                        .saturating_duration_since(start_instant)
                        .as_millis() as u64;

                    match message {
                        Some(EngineMessage::Cycle(update)) => {
                            let max = events_tx.max_capacity();
                            let occupied = max - events_tx.capacity();
                            telemetry::hub().record_queue_occupancy(
                                "results",
                                occupied as f32 / max as f32 * 100.0,
                            );

                            // Display surfaces see every cycle, matched or not
                            let _ = update_tx.send(update.clone());

                            let snapshot =
                                *toggles.read().unwrap_or_else(|err| err.into_inner());
                            let (pending, advanced) = evaluate(
                                &watch_table,
                                &update.results,
                                &snapshot,
                                counter,
                                now_ms,
                            );
                            counter = advanced;
                            telemetry::hub().record_cycle(&update, pending.len());

                            for request in &pending {
                                if let Err(err) = sink.ensure_channel(&request.channel) {
                                    log_notify_error(&err, "ensure_channel");
                                    telemetry::hub().record_error(
                                        DiagnosticError::SinkFailure,
                                        format!("channel {}: {}", request.channel.id, err),
                                    );
                                    continue;
                                }
                                match sink.post(request) {
                                    Ok(()) => {
                                        let _ = notification_tx.send(request.clone());
                                        telemetry::hub().record_notification(request);
                                    }
                                    Err(err) => {
                                        log_notify_error(&err, "post_notification");
                                        telemetry::hub().record_error(
                                            DiagnosticError::SinkFailure,
                                            format!("post id {}: {}", request.id, err),
                                        );
                                    }
                                }
                            }
                        }
                        Some(EngineMessage::Fault { message }) => {
                            tracing::warn!("[DispatchWorker] Classifier fault: {}", message);
                            telemetry::hub().record_fault(&message);
                            let _ = fault_tx.send(ClassifierFault {
                                message,
                                timestamp_ms: now_ms,
                            });
                            // Consumers clear their displayed results on an empty update
                            let _ = update_tx.send(ClassificationUpdate {
                                results: Vec::new(),
                                latency_ms: 0.0,
                            });
                        }
                        None => break,
                    }
                }
            });
        });
    }

    fn init_command_worker(&self) {
        if self
            .command_worker_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let command_rx = Arc::clone(&self.command_rx);
        let core = self.reconfigure_core();

        // Spawn a dedicated thread with its own Tokio runtime so callers
        // without a runtime can still queue patches
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime for command worker");

            rt.block_on(async move {
                loop {
                    let patch = {
                        let mut guard = command_rx.lock().await;
                        guard.recv().await
                    };

                    match patch {
                        Some(patch) => {
                            if patch.is_empty() {
                                continue;
                            }
                            if let Err(err) = core.apply_patch(&patch) {
                                log_classify_error(&err, "apply_patch");
                                core.emit(
                                    TelemetryEventKind::Warning,
                                    Some(format!("Failed to apply classifier patch: {}", err)),
                                );
                            }
                        }
                        None => break,
                    }
                }
            });
        });
    }

    fn publish_event(
        tx: &broadcast::Sender<TelemetryEvent>,
        time_source: &Arc<dyn TimeSource>,
        start_instant: Instant,
        kind: TelemetryEventKind,
        detail: Option<String>,
    ) {
        let timestamp_ms = time_source
            .now()
            .saturating_duration_since(start_instant)
            .as_millis() as u64;
        let _ = tx.send(TelemetryEvent {
            timestamp_ms,
            kind,
            detail,
        });
    }

    fn emit_event(&self, kind: TelemetryEventKind, detail: Option<String>) {
        Self::publish_event(
            &self.telemetry_tx,
            &self.time_source,
            self.start_instant,
            kind,
            detail,
        );
    }

    fn reconfigure_core(&self) -> ReconfigureCore {
        ReconfigureCore {
            config: Arc::clone(&self.config),
            backend: Arc::clone(&self.backend),
            engine_running: Arc::clone(&self.engine_running),
            events_tx: self.events_tx.clone(),
            telemetry_tx: self.telemetry_tx.clone(),
            time_source: Arc::clone(&self.time_source),
            start_instant: self.start_instant,
        }
    }

    // ========================================================================
    // CLASSIFIER LIFECYCLE
    // ========================================================================

    /// Start the classifier with the current parameters.
    pub fn start(&self) -> Result<(), ClassifyError> {
        let params = self.reconfigure_core().start_classifier()?;
        self.emit_event(TelemetryEventKind::EngineStarted { params }, None);
        telemetry::hub().record_lifecycle(LifecyclePhase::Started);
        self.init_dispatch_worker();
        self.init_command_worker();
        Ok(())
    }

    /// Stop the classifier. Toggles and the notification counter survive.
    pub fn stop(&self) -> Result<(), ClassifyError> {
        if !self.engine_running.load(Ordering::SeqCst) {
            return Err(ClassifyError::NotRunning);
        }

        self.backend.stop()?;
        self.engine_running.store(false, Ordering::SeqCst);
        self.emit_event(TelemetryEventKind::EngineStopped, None);
        telemetry::hub().record_lifecycle(LifecyclePhase::Stopped);
        Ok(())
    }

    /// Lifecycle hook: bring the classifier up, tolerating an engine that
    /// is already running.
    pub fn resume(&self) -> Result<(), ClassifyError> {
        match self.start() {
            Err(ClassifyError::AlreadyRunning) => Ok(()),
            other => other,
        }
    }

    /// Lifecycle hook: take the classifier down, tolerating a stopped
    /// engine.
    pub fn pause(&self) -> Result<(), ClassifyError> {
        match self.stop() {
            Err(ClassifyError::NotRunning) => Ok(()),
            other => other,
        }
    }

    // ========================================================================
    // EVENT TOGGLES
    // ========================================================================

    /// Arm or disarm notifications for one event kind. Takes effect on
    /// the next dispatched cycle; the engine keeps running throughout.
    pub fn set_toggle(&self, kind: EventKind, enabled: bool) {
        let snapshot = {
            let mut guard = self.toggles.write().unwrap_or_else(|err| err.into_inner());
            guard.set(kind, enabled);
            *guard
        };
        self.emit_event(
            TelemetryEventKind::TogglesChanged { toggles: snapshot },
            None,
        );
    }

    /// Replace all three toggles at once.
    pub fn set_toggles(&self, toggles: EventToggles) {
        {
            let mut guard = self.toggles.write().unwrap_or_else(|err| err.into_inner());
            *guard = toggles;
        }
        self.emit_event(TelemetryEventKind::TogglesChanged { toggles }, None);
    }

    // ========================================================================
    // PARAMETER RECONFIGURATION
    // ========================================================================

    /// Apply a parameter patch. A running classifier is stopped, updated,
    /// and started again with the new parameters; a stopped one just
    /// takes the new values.
    pub fn apply_patch(&self, patch: &ClassifierPatch) -> Result<bool, ClassifyError> {
        self.reconfigure_core().apply_patch(patch)
    }

    /// Step the score threshold one notch. Returns false when the guard
    /// at either end refuses the step.
    pub fn step_threshold(&self, up: bool) -> Result<bool, ClassifyError> {
        self.reconfigure_core().reconfigure_with(|params| {
            if up {
                params.increment_threshold()
            } else {
                params.decrement_threshold()
            }
        })
    }

    /// Step the returned result count one notch.
    pub fn step_results(&self, up: bool) -> Result<bool, ClassifyError> {
        self.reconfigure_core().reconfigure_with(|params| {
            if up {
                params.increment_results()
            } else {
                params.decrement_results()
            }
        })
    }

    /// Step the interpreter thread count one notch.
    pub fn step_threads(&self, up: bool) -> Result<bool, ClassifyError> {
        self.reconfigure_core().reconfigure_with(|params| {
            if up {
                params.increment_threads()
            } else {
                params.decrement_threads()
            }
        })
    }

    /// Select an overlap position on the quarter-window grid.
    pub fn select_overlap_position(&self, position: usize) -> Result<bool, ClassifyError> {
        self.reconfigure_core().reconfigure_with(|params| {
            let before = params.overlap;
            params.set_overlap_position(position);
            (params.overlap - before).abs() > f32::EPSILON
        })
    }
}

/// Reconfiguration state shared between the handle and the command
/// worker. Everything inside is Arc-backed, so cloning is cheap.
#[derive(Clone)]
struct ReconfigureCore {
    config: Arc<RwLock<SentryConfig>>,
    backend: Arc<dyn ClassifierBackend>,
    engine_running: Arc<AtomicBool>,
    events_tx: mpsc::Sender<EngineMessage>,
    telemetry_tx: broadcast::Sender<TelemetryEvent>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl ReconfigureCore {
    fn start_classifier(&self) -> Result<ClassifierParams, ClassifyError> {
        let params = self
            .config
            .read()
            .map(|config| config.classifier.clone())
            .unwrap_or_else(|err| err.into_inner().classifier.clone());
        params.validate()?;

        let ctx = ClassifierStartContext {
            params: params.clone(),
            events: self.events_tx.clone(),
        };

        self.backend.start(ctx)?;
        self.engine_running.store(true, Ordering::SeqCst);
        Ok(params)
    }

    fn apply_patch(&self, patch: &ClassifierPatch) -> Result<bool, ClassifyError> {
        self.reconfigure_with(|params| {
            let before = params.clone();
            if let Some(position) = patch.overlap_position {
                params.set_overlap_position(position);
            }
            if let Some(count) = patch.max_results {
                params.set_max_results(count);
            }
            if let Some(threshold) = patch.score_threshold {
                params.set_score_threshold(threshold);
            }
            if let Some(threads) = patch.num_threads {
                params.set_num_threads(threads);
            }
            *params != before
        })
    }

    /// Shared reconfiguration path: mutate parameters, then rebuild the
    /// classifier when it was running and the mutation changed anything.
    fn reconfigure_with(
        &self,
        mutate: impl FnOnce(&mut ClassifierParams) -> bool,
    ) -> Result<bool, ClassifyError> {
        let (changed, params) = {
            let mut config = self.config.write().unwrap_or_else(|err| err.into_inner());
            let changed = mutate(&mut config.classifier);
            (changed, config.classifier.clone())
        };

        if !changed {
            return Ok(false);
        }

        if self.engine_running.load(Ordering::SeqCst) {
            self.backend.stop()?;
            self.engine_running.store(false, Ordering::SeqCst);
            self.start_classifier()?;
        }

        self.emit(TelemetryEventKind::ParamsChanged { params }, None);
        telemetry::hub().record_lifecycle(LifecyclePhase::Reconfigured);
        Ok(true)
    }

    fn emit(&self, kind: TelemetryEventKind, detail: Option<String>) {
        SentryHandle::publish_event(
            &self.telemetry_tx,
            &self.time_source,
            self.start_instant,
            kind,
            detail,
        );
    }
}

impl Default for SentryHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
