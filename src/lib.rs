// Sound Sentry Core - Sound Event Notification Engine
// Evaluates classified audio categories against per-event toggles and
// drives cyclic-ID notifications through a pluggable delivery sink

// Module declarations
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod http;
pub mod managers;
pub mod notify;
pub mod telemetry;

// Re-exports for convenience
pub use config::{ClassifierParams, SentryConfig};
pub use detect::{
    CategoryResult, ClassificationUpdate, ClassifierFault, EventKind, EventToggles,
    NotificationCounter, WatchTable, ID_WINDOW,
};
pub use engine::{ClassifierPatch, SentryHandle, TelemetryEvent, TelemetryEventKind};
pub use error::{ClassifyError, ErrorCode, NotifyError};
pub use notify::{ChannelSpec, LogSink, MemorySink, NotificationRequest, NotificationSink};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_exports_cover_policy_surface() {
        // The policy entry points stay reachable from the crate root
        let table = WatchTable::default();
        let toggles = EventToggles::default();
        let (pending, counter) = detect::evaluate(
            &table,
            &[CategoryResult {
                index: detect::INDEX_BABY,
                score: 0.9,
            }],
            &toggles,
            NotificationCounter::new(),
            0,
        );
        assert!(pending.is_empty());
        assert_eq!(counter.value(), 0);
    }
}
