// Error types for the sound sentry core
//
// This module defines custom error types for classifier-boundary and
// notification-delivery operations, providing structured error handling
// with stable numeric codes suitable for UI shell communication.

mod classify;
mod notify;

pub use classify::{log_classify_error, ClassifyError, ClassifyErrorCodes};
pub use notify::{log_notify_error, NotifyError, NotifyErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the shell boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
