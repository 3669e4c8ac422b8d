// Notification delivery error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Notification error code constants exposed to UI shells
///
/// Error code range: 2001-2003
pub struct NotifyErrorCodes {}

impl NotifyErrorCodes {
    /// Channel registration with the platform service failed
    pub const CHANNEL_REGISTRATION_FAILED: i32 = 2001;

    /// Posting the notification failed
    pub const POST_FAILED: i32 = 2002;

    /// Mutex was poisoned inside a sink
    pub const LOCK_POISONED: i32 = 2003;
}

/// Log a notification delivery error with structured context
pub fn log_notify_error(err: &NotifyError, context: &str) {
    error!(
        "Notification error in {}: code={}, component=NotificationSink, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Notification delivery errors
///
/// These errors cover channel registration and posting through a
/// [`crate::notify::NotificationSink`] implementation.
///
/// Error code range: 2001-2003
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyError {
    /// Channel registration with the platform service failed
    ChannelRegistrationFailed { channel_id: String, reason: String },

    /// Posting the notification failed
    PostFailed { id: u32, reason: String },

    /// Mutex was poisoned inside a sink
    LockPoisoned { component: String },
}

impl ErrorCode for NotifyError {
    fn code(&self) -> i32 {
        match self {
            NotifyError::ChannelRegistrationFailed { .. } => {
                NotifyErrorCodes::CHANNEL_REGISTRATION_FAILED
            }
            NotifyError::PostFailed { .. } => NotifyErrorCodes::POST_FAILED,
            NotifyError::LockPoisoned { .. } => NotifyErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            NotifyError::ChannelRegistrationFailed { channel_id, reason } => {
                format!("Failed to register channel '{}': {}", channel_id, reason)
            }
            NotifyError::PostFailed { id, reason } => {
                format!("Failed to post notification {}: {}", id, reason)
            }
            NotifyError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NotifyError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for NotifyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_error_codes() {
        assert_eq!(
            NotifyError::ChannelRegistrationFailed {
                channel_id: "baby".to_string(),
                reason: "test".to_string()
            }
            .code(),
            NotifyErrorCodes::CHANNEL_REGISTRATION_FAILED
        );
        assert_eq!(
            NotifyError::PostFailed {
                id: 3,
                reason: "test".to_string()
            }
            .code(),
            NotifyErrorCodes::POST_FAILED
        );
        assert_eq!(
            NotifyError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            NotifyErrorCodes::LOCK_POISONED
        );
    }

    #[test]
    fn test_notify_error_messages() {
        let err = NotifyError::ChannelRegistrationFailed {
            channel_id: "glass".to_string(),
            reason: "service unavailable".to_string(),
        };
        assert!(err.message().contains("glass"));
        assert!(err.message().contains("service unavailable"));

        let err = NotifyError::PostFailed {
            id: 7,
            reason: "rejected".to_string(),
        };
        assert!(err.message().contains('7'));
    }

    #[test]
    fn test_notify_error_display() {
        let err = NotifyError::LockPoisoned {
            component: "memory sink".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("NotifyError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
