//! Telemetry event types describing diagnostics data exposed to the
//! CLI and HTTP surfaces.

use serde::{Deserialize, Serialize};

use crate::detect::EventKind;

/// Engine lifecycle stages reported by the orchestration layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Started,
    Stopped,
    Reconfigured,
}

/// Diagnostic error codes surfaced via telemetry metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    Inference,
    FixtureLoad,
    QueueBackpressure,
    SinkFailure,
    Unknown,
}

/// Metric events covering inference cycles, deliveries, and queue health.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Latency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    Cycle {
        result_count: usize,
        matched: usize,
        latency_ms: f32,
    },
    Notification {
        kind: Option<EventKind>,
        id: u32,
        channel: String,
    },
    QueueOccupancy {
        channel: String,
        percent: f32,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}
