use std::sync::atomic::Ordering;

use futures::Stream;
use tokio::runtime::Builder;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::TelemetryEvent;
use crate::config::SentryConfig;
use crate::detect::{ClassificationUpdate, ClassifierFault, EventToggles};
use crate::notify::NotificationRequest;

use super::{ClassifierPatch, SentryHandle};

impl SentryHandle {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_updates(&self) -> mpsc::UnboundedReceiver<ClassificationUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(mut broadcast_rx) = self.broadcasts.subscribe_updates() {
            std::thread::spawn(move || {
                let rt = Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("Failed to create Tokio runtime");
                rt.block_on(async move {
                    while let Ok(update) = broadcast_rx.recv().await {
                        if tx.send(update).is_err() {
                            break;
                        }
                    }
                });
            });
        }

        rx
    }

    pub fn subscribe_notifications(&self) -> mpsc::UnboundedReceiver<NotificationRequest> {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(mut broadcast_rx) = self.broadcasts.subscribe_notifications() {
            std::thread::spawn(move || {
                let rt = Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("Failed to create Tokio runtime");
                rt.block_on(async move {
                    while let Ok(record) = broadcast_rx.recv().await {
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                });
            });
        }

        rx
    }

    pub fn subscribe_faults(&self) -> mpsc::UnboundedReceiver<ClassifierFault> {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(mut broadcast_rx) = self.broadcasts.subscribe_faults() {
            std::thread::spawn(move || {
                let rt = Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("Failed to create Tokio runtime");
                rt.block_on(async move {
                    while let Ok(fault) = broadcast_rx.recv().await {
                        if tx.send(fault).is_err() {
                            break;
                        }
                    }
                });
            });
        }

        rx
    }

    pub fn subscribe_telemetry(&self) -> mpsc::UnboundedReceiver<TelemetryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.telemetry_tx.subscribe();

        std::thread::spawn(move || {
            let rt = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime");
            rt.block_on(async move {
                while let Ok(event) = broadcast_rx.recv().await {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            });
        });

        rx
    }

    pub fn telemetry_receiver(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry_tx.subscribe()
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub async fn update_stream(&self) -> impl Stream<Item = ClassificationUpdate> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_updates())
    }

    pub async fn notification_stream(&self) -> impl Stream<Item = NotificationRequest> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_notifications())
    }

    pub async fn fault_stream(&self) -> impl Stream<Item = ClassifierFault> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_faults())
    }

    pub async fn telemetry_stream(&self) -> impl Stream<Item = TelemetryEvent> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_telemetry())
    }

    // ========================================================================
    // PARAM PATCH COMMANDS
    // ========================================================================

    /// Get a clone of the sender for ClassifierPatch commands.
    pub fn command_sender(&self) -> mpsc::Sender<ClassifierPatch> {
        self.command_tx.clone()
    }

    /// Check whether the classifier backend is running (best effort).
    pub fn is_running(&self) -> bool {
        self.engine_running.load(Ordering::SeqCst)
    }

    /// Milliseconds elapsed since the handle was created (used for telemetry).
    pub fn uptime_ms(&self) -> u64 {
        self.time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64
    }

    /// Snapshot the current configuration (tooling helper).
    pub fn config_snapshot(&self) -> SentryConfig {
        self.config
            .read()
            .map(|config| config.clone())
            .unwrap_or_else(|err| err.into_inner().clone())
    }

    /// Snapshot the per-event toggles.
    pub fn toggles_snapshot(&self) -> EventToggles {
        *self.toggles.read().unwrap_or_else(|err| err.into_inner())
    }
}
