// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::detect::{ClassificationUpdate, ClassifierFault};
use crate::notify::NotificationRequest;

/// Manages all tokio broadcast channels
///
/// Single Responsibility: Broadcast channel lifecycle and subscription
///
/// This manager centralizes all broadcast channel creation, storage, and
/// subscription handling. It provides a clean interface for:
/// - Initializing broadcast channels with appropriate buffer sizes
/// - Subscribing to broadcast channels for multiple consumers
/// - Managing channel lifecycle (creation, cleanup)
///
/// # Channel Types
/// - Updates: Per-cycle classification results for display surfaces
/// - Notifications: Posted notification records for observers
/// - Faults: Classifier failures surfaced to display surfaces
pub struct BroadcastChannelManager {
    updates: Arc<Mutex<Option<broadcast::Sender<ClassificationUpdate>>>>,
    notifications: Arc<Mutex<Option<broadcast::Sender<NotificationRequest>>>>,
    faults: Arc<Mutex<Option<broadcast::Sender<ClassifierFault>>>>,
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self {
            updates: Arc::new(Mutex::new(None)),
            notifications: Arc::new(Mutex::new(None)),
            faults: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // CLASSIFICATION UPDATE CHANNEL
    // ========================================================================

    /// Initialize the classification update broadcast channel
    ///
    /// Returns sender for the dispatch worker to publish per-cycle results.
    /// Creates a broadcast channel with 100-message buffer to handle burst traffic.
    ///
    /// # Returns
    /// `broadcast::Sender<ClassificationUpdate>` - Sender for publishing updates
    ///
    /// # Notes
    /// - Buffer size: 100 messages (sufficient for ~100 seconds of cycles)
    /// - Multiple subscribers supported via broadcast pattern
    /// - Old messages dropped if buffer fills (lagged subscribers)
    pub fn init_updates(&self) -> broadcast::Sender<ClassificationUpdate> {
        let (tx, _) = broadcast::channel(100);
        *self.updates.lock().unwrap() = Some(tx.clone());
        tx
    }

    /// Subscribe to classification updates
    ///
    /// Returns a receiver for consuming per-cycle results. Each subscriber
    /// receives independent copies of all messages via the broadcast channel.
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<ClassificationUpdate>>` - Receiver or None if not initialized
    ///
    /// # Notes
    /// - Returns None if init_updates() not called yet
    /// - Each subscriber gets independent receiver
    /// - Subscribers must keep up with message rate or will lag
    pub fn subscribe_updates(&self) -> Option<broadcast::Receiver<ClassificationUpdate>> {
        self.updates.lock().unwrap().as_ref().map(|tx| tx.subscribe())
    }

    // ========================================================================
    // NOTIFICATION CHANNEL
    // ========================================================================

    /// Initialize the notification broadcast channel
    ///
    /// Returns sender for the dispatch worker to publish posted notifications.
    /// Creates a broadcast channel with 50-message buffer (notification bursts
    /// top out at a handful per cycle).
    ///
    /// # Returns
    /// `broadcast::Sender<NotificationRequest>` - Sender for publishing records
    ///
    /// # Notes
    /// - Buffer size: 50 messages
    /// - Records carry the slot ID, channel, and timestamp of each post
    pub fn init_notifications(&self) -> broadcast::Sender<NotificationRequest> {
        let (tx, _) = broadcast::channel(50);
        *self.notifications.lock().unwrap() = Some(tx.clone());
        tx
    }

    /// Subscribe to posted notification records
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<NotificationRequest>>` - Receiver or None if not initialized
    pub fn subscribe_notifications(&self) -> Option<broadcast::Receiver<NotificationRequest>> {
        self.notifications
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    // ========================================================================
    // FAULT CHANNEL
    // ========================================================================

    /// Initialize the classifier fault broadcast channel
    ///
    /// Returns sender for the dispatch worker to publish engine failures.
    /// Creates a broadcast channel with 50-message buffer.
    ///
    /// # Returns
    /// `broadcast::Sender<ClassifierFault>` - Sender for publishing faults
    ///
    /// # Notes
    /// - Buffer size: 50 messages
    /// - Faults also clear the displayed result list on consumers
    pub fn init_faults(&self) -> broadcast::Sender<ClassifierFault> {
        let (tx, _) = broadcast::channel(50);
        *self.faults.lock().unwrap() = Some(tx.clone());
        tx
    }

    /// Subscribe to classifier faults
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<ClassifierFault>>` - Receiver or None if not initialized
    pub fn subscribe_faults(&self) -> Option<broadcast::Receiver<ClassifierFault>> {
        self.faults.lock().unwrap().as_ref().map(|tx| tx.subscribe())
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
