//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes inference latency, notification deliveries,
//! queue occupancy, and engine lifecycle events into a bounded history
//! plus an async broadcast stream.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::{broadcast, mpsc};

use crate::detect::ClassificationUpdate;
use crate::notify::NotificationRequest;

pub mod events;

pub use events::{DiagnosticError, LifecyclePhase, MetricEvent};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub notifications_posted: u64,
    pub faults: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self
                .history
                .lock()
                .unwrap_or_else(|err| err.into_inner());
            while history.len() >= self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn subscribe_unbounded(&self) -> mpsc::UnboundedReceiver<MetricEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.tx.subscribe();

        tokio::spawn(async move {
            while let Ok(event) = broadcast_rx.recv().await {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        rx
    }

    fn recent(&self) -> Vec<MetricEvent> {
        self.history
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn total(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    fn dropped(&self) -> u64 {
        self.dropped_history.load(Ordering::Relaxed)
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling latency window for avg/max reporting.
struct LatencyTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

struct LatencyStats {
    avg_ms: f32,
    max_ms: f32,
    count: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn observe(&mut self, value: f32) -> LatencyStats {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max_ms = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        let avg_ms = if count == 0 { 0.0 } else { sum / count as f32 };
        LatencyStats {
            avg_ms,
            max_ms,
            count,
        }
    }
}

/// Top-level hub wrapping collector state plus derived gauges and counters.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    latency: Mutex<LatencyTracker>,
    queue_gauges: Mutex<HashMap<&'static str, f32>>,
    notifications_posted: AtomicU64,
    faults: AtomicU64,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, latency_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            latency: Mutex::new(LatencyTracker::new(latency_window)),
            queue_gauges: Mutex::new(HashMap::new()),
            notifications_posted: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            recent: self.collector.recent(),
            total_events: self.collector.total(),
            dropped_events: self.collector.dropped(),
            notifications_posted: self.notifications_posted.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }

    /// Record one classification cycle and fold its latency into the window.
    pub fn record_cycle(&self, update: &ClassificationUpdate, matched: usize) {
        let latency_ms = update.latency_ms as f32;
        self.collector.publish(MetricEvent::Cycle {
            result_count: update.results.len(),
            matched,
            latency_ms,
        });

        let stats = {
            let mut tracker = self
                .latency
                .lock()
                .unwrap_or_else(|err| err.into_inner());
            tracker.observe(latency_ms)
        };

        self.collector.publish(MetricEvent::Latency {
            avg_ms: stats.avg_ms,
            max_ms: stats.max_ms,
            sample_count: stats.count,
        });
    }

    pub fn record_notification(&self, request: &NotificationRequest) {
        self.notifications_posted.fetch_add(1, Ordering::Relaxed);
        self.collector.publish(MetricEvent::Notification {
            kind: request.kind,
            id: request.id,
            channel: request.channel.id.to_string(),
        });
    }

    /// Gauge updates below a 2.5 point delta are swallowed to keep the
    /// stream quiet while the queue idles around one fill level.
    pub fn record_queue_occupancy(&self, channel: &'static str, percent: f32) {
        let normalized = percent.clamp(0.0, 100.0);
        let mut gauges = self
            .queue_gauges
            .lock()
            .unwrap_or_else(|err| err.into_inner());

        let should_emit = gauges
            .get(channel)
            .map(|last| (last - normalized).abs() >= 2.5)
            .unwrap_or(true);

        if should_emit {
            gauges.insert(channel, normalized);
            self.collector.publish(MetricEvent::QueueOccupancy {
                channel: channel.to_string(),
                percent: normalized,
            });
        }
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_fault(&self, context: impl Into<String>) {
        self.faults.fetch_add(1, Ordering::Relaxed);
        self.collector.publish(MetricEvent::Error {
            code: DiagnosticError::Inference,
            context: context.into(),
        });
    }

    pub fn record_error(&self, code: DiagnosticError, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code,
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{CategoryResult, EventKind};

    fn sample_update(latency_ms: f64) -> ClassificationUpdate {
        ClassificationUpdate {
            results: vec![CategoryResult {
                index: 20,
                score: 0.9,
            }],
            latency_ms,
        }
    }

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::Latency {
            avg_ms: 1.0,
            max_ms: 2.0,
            sample_count: 1,
        });
        collector.publish(MetricEvent::Latency {
            avg_ms: 3.0,
            max_ms: 4.0,
            sample_count: 2,
        });
        collector.publish(MetricEvent::QueueOccupancy {
            channel: "results".to_string(),
            percent: 50.0,
        });

        let recent = collector.recent();
        assert_eq!(recent.len(), 3);
        assert!(
            matches!(recent[0], MetricEvent::Latency { avg_ms, .. } if (avg_ms - 1.0).abs() < f32::EPSILON)
        );
        assert!(matches!(recent[2], MetricEvent::QueueOccupancy { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for sample_count in 1..=3 {
            collector.publish(MetricEvent::Latency {
                avg_ms: sample_count as f32,
                max_ms: sample_count as f32,
                sample_count,
            });
        }

        let recent = collector.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(collector.dropped(), 1);
        assert!(
            matches!(recent[0], MetricEvent::Latency { sample_count, .. } if sample_count == 2)
        );
    }

    #[test]
    fn hub_emits_cycle_and_latency() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_cycle(&sample_update(12.0), 1);
        hub.record_cycle(&sample_update(6.0), 0);

        let snapshot = hub.snapshot();
        assert!(snapshot.total_events >= 4);
        assert!(snapshot
            .recent
            .iter()
            .any(|event| matches!(event, MetricEvent::Cycle { matched: 1, .. })));
        assert!(snapshot
            .recent
            .iter()
            .any(|event| matches!(event, MetricEvent::Latency { .. })));
    }

    #[test]
    fn hub_counts_notifications_and_faults() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_notification(&NotificationRequest::for_event(EventKind::Gunshot, 0, 10));
        hub.record_notification(&NotificationRequest::for_event(EventKind::BabyCrying, 1, 20));
        hub.record_fault("interpreter crashed");

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.notifications_posted, 2);
        assert_eq!(snapshot.faults, 1);
        assert!(snapshot.recent.iter().any(|event| matches!(
            event,
            MetricEvent::Notification { id: 1, .. }
        )));
        assert!(snapshot.recent.iter().any(|event| matches!(
            event,
            MetricEvent::Error {
                code: DiagnosticError::Inference,
                ..
            }
        )));
    }

    #[test]
    fn queue_gauge_debounces_small_changes() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_queue_occupancy("results", 10.0);
        hub.record_queue_occupancy("results", 10.5);
        hub.record_queue_occupancy("results", 25.0);

        let snapshot = hub.snapshot();
        assert_eq!(
            snapshot
                .recent
                .iter()
                .filter(|event| matches!(event, MetricEvent::QueueOccupancy { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn hub_exposes_live_collector_stream() {
        let hub = TelemetryHub::new(8, 8, 4);
        let mut rx = hub.collector().subscribe();
        hub.record_lifecycle(LifecyclePhase::Started);

        assert!(matches!(
            rx.try_recv(),
            Ok(MetricEvent::Lifecycle {
                phase: LifecyclePhase::Started,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn unbounded_subscription_forwards_events() {
        let collector = TelemetryCollector::new(8, 4);
        let mut rx = collector.subscribe_unbounded();
        collector.publish(MetricEvent::QueueOccupancy {
            channel: "results".to_string(),
            percent: 42.0,
        });

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for forwarded event")
            .expect("forwarder closed");
        assert!(matches!(event, MetricEvent::QueueOccupancy { .. }));
    }
}
