// Classifier boundary error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Classifier error code constants exposed to UI shells
///
/// These constants provide a single source of truth for error codes
/// shared between the core and any embedding shell.
///
/// Error code range: 1001-1006
pub struct ClassifyErrorCodes {}

impl ClassifyErrorCodes {
    /// Classification engine is already running
    pub const ALREADY_RUNNING: i32 = 1001;

    /// Classification engine is not running
    pub const NOT_RUNNING: i32 = 1002;

    /// Engine initialization failed
    pub const INIT_FAILED: i32 = 1003;

    /// Engine parameters are outside their accepted ranges
    pub const INVALID_PARAMS: i32 = 1004;

    /// Result delivery queue closed unexpectedly
    pub const DELIVERY_CLOSED: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;
}

/// Log a classifier error with structured context
///
/// Logs include the numeric error code, the component name, and a
/// human-readable message. Logging is non-blocking and will not panic.
pub fn log_classify_error(err: &ClassifyError, context: &str) {
    error!(
        "Classifier error in {}: code={}, component=SentryEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Classifier boundary errors
///
/// These errors cover engine lifecycle, parameter validation, and the
/// delivery path between the engine and the dispatch worker.
///
/// Error code range: 1001-1006
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifyError {
    /// Classification engine is already running
    AlreadyRunning,

    /// Classification engine is not running
    NotRunning,

    /// Engine initialization failed
    InitFailed { reason: String },

    /// Engine parameters are outside their accepted ranges
    InvalidParams { detail: String },

    /// Result delivery queue closed unexpectedly
    DeliveryClosed,

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for ClassifyError {
    fn code(&self) -> i32 {
        match self {
            ClassifyError::AlreadyRunning => ClassifyErrorCodes::ALREADY_RUNNING,
            ClassifyError::NotRunning => ClassifyErrorCodes::NOT_RUNNING,
            ClassifyError::InitFailed { .. } => ClassifyErrorCodes::INIT_FAILED,
            ClassifyError::InvalidParams { .. } => ClassifyErrorCodes::INVALID_PARAMS,
            ClassifyError::DeliveryClosed => ClassifyErrorCodes::DELIVERY_CLOSED,
            ClassifyError::LockPoisoned { .. } => ClassifyErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassifyError::AlreadyRunning => {
                "Classification engine already running. Call stop() first.".to_string()
            }
            ClassifyError::NotRunning => {
                "Classification engine not running. Call start() first.".to_string()
            }
            ClassifyError::InitFailed { reason } => {
                format!("Engine initialization failed: {}", reason)
            }
            ClassifyError::InvalidParams { detail } => {
                format!("Invalid engine parameters: {}", detail)
            }
            ClassifyError::DeliveryClosed => {
                "Result delivery queue closed. The dispatch worker is gone.".to_string()
            }
            ClassifyError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassifyError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassifyError {}

impl From<std::io::Error> for ClassifyError {
    fn from(err: std::io::Error) -> Self {
        ClassifyError::InitFailed {
            reason: err.to_string(),
        }
    }
}
