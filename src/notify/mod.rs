//! Notification channel registry and delivery boundary
//!
//! Models the platform notification surface behind a narrow trait so
//! the engine can run against an in-memory sink in tests and a logging
//! sink on the desktop. Channel metadata matches what the mobile shell
//! registers with the OS.

use crate::detect::EventKind;
use crate::error::NotifyError;
use serde::Serialize;
use std::sync::Mutex;

/// Notification channel importance, mirroring the platform levels we use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelImportance {
    Default,
    High,
}

/// Static description of one notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub importance: ChannelImportance,
}

impl ChannelSpec {
    pub const BABY: ChannelSpec = ChannelSpec {
        id: "baby",
        name: "Event Occurs",
        description: "Baby is crying",
        importance: ChannelImportance::High,
    };

    pub const GLASS: ChannelSpec = ChannelSpec {
        id: "glass",
        name: "Event Occurs",
        description: "Glass was broken",
        importance: ChannelImportance::High,
    };

    pub const GUN: ChannelSpec = ChannelSpec {
        id: "gun",
        name: "Event Occurs",
        description: "Gun was fired",
        importance: ChannelImportance::High,
    };

    /// Channel used by delivery probes with no detected event behind them
    pub const FALLBACK: ChannelSpec = ChannelSpec {
        id: "test",
        name: "My notification",
        description: "Hello world",
        importance: ChannelImportance::High,
    };

    pub fn for_kind(kind: EventKind) -> &'static ChannelSpec {
        match kind {
            EventKind::BabyCrying => &Self::BABY,
            EventKind::GlassBreak => &Self::GLASS,
            EventKind::Gunshot => &Self::GUN,
        }
    }
}

/// A fully resolved notification, ready to hand to a sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    /// Slot ID in the cyclic window; later posts reuse earlier slots
    pub id: u32,
    /// Detected event, or None for a delivery probe
    pub kind: Option<EventKind>,
    pub channel: ChannelSpec,
    /// Milliseconds since engine start
    pub posted_at_ms: u64,
    /// Whether tapping the notification dismisses it
    pub auto_cancel: bool,
}

impl NotificationRequest {
    pub fn for_event(kind: EventKind, id: u32, now_ms: u64) -> Self {
        Self {
            id,
            kind: Some(kind),
            channel: *ChannelSpec::for_kind(kind),
            posted_at_ms: now_ms,
            auto_cancel: true,
        }
    }

    /// A probe through the fallback channel, exercising delivery end to end.
    pub fn probe(id: u32, now_ms: u64) -> Self {
        Self {
            id,
            kind: None,
            channel: ChannelSpec::FALLBACK,
            posted_at_ms: now_ms,
            auto_cancel: true,
        }
    }

    /// Notification title, taken from the channel name.
    pub fn title(&self) -> &'static str {
        self.channel.name
    }

    /// Notification body, taken from the channel description.
    pub fn body(&self) -> &'static str {
        self.channel.description
    }
}

/// Delivery boundary for posted notifications
///
/// `ensure_channel` is called before every post; sinks must tolerate
/// re-registration of a channel they already know.
pub trait NotificationSink: Send + Sync {
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), NotifyError>;
    fn post(&self, request: &NotificationRequest) -> Result<(), NotifyError>;
}

/// In-memory sink recording every call, for tests and replay verification
#[derive(Debug, Default)]
pub struct MemorySink {
    registrations: Mutex<Vec<ChannelSpec>>,
    posted: Mutex<Vec<NotificationRequest>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every channel registration in call order, repeats included.
    pub fn registrations(&self) -> Vec<ChannelSpec> {
        self.registrations
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|err| err.into_inner().clone())
    }

    /// Every posted notification in call order.
    pub fn posted(&self) -> Vec<NotificationRequest> {
        self.posted
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|err| err.into_inner().clone())
    }

    pub fn posted_count(&self) -> usize {
        self.posted
            .lock()
            .map(|guard| guard.len())
            .unwrap_or_else(|err| err.into_inner().len())
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.registrations.lock() {
            guard.clear();
        }
        if let Ok(mut guard) = self.posted.lock() {
            guard.clear();
        }
    }
}

impl NotificationSink for MemorySink {
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), NotifyError> {
        let mut guard = self
            .registrations
            .lock()
            .map_err(|_| NotifyError::LockPoisoned {
                component: "MemorySink.registrations".to_string(),
            })?;
        guard.push(*channel);
        Ok(())
    }

    fn post(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        let mut guard = self.posted.lock().map_err(|_| NotifyError::LockPoisoned {
            component: "MemorySink.posted".to_string(),
        })?;
        guard.push(request.clone());
        Ok(())
    }
}

/// Sink that writes notifications to the log, for desktop runs
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl NotificationSink for LogSink {
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), NotifyError> {
        tracing::debug!(
            "[NotificationSink] Channel ready: id={} name={:?}",
            channel.id,
            channel.name
        );
        Ok(())
    }

    fn post(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        tracing::info!(
            "[NotificationSink] Posted id={} channel={} title={:?} body={:?}",
            request.id,
            request.channel.id,
            request.title(),
            request.body()
        );
        Ok(())
    }
}
