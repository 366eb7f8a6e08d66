//! Scanner Error Types

use std::fmt;

/// Errors raised while starting or running a radio backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Transient I/O failure (sniffer died, adapter busy); worth retrying
    Io { message: String },
    /// Operator-fixable problem (unknown backend, missing binary); not retried
    Configuration { message: String },
}

impl ScanError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ScanError::Io { .. })
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Io { message } => write!(f, "IO error: {}", message),
            ScanError::Configuration { message } => write!(f, "Configuration error: {}", message),
        }
    }
}

impl std::error::Error for ScanError {}

impl crate::core::error_handling::ContextualError for ScanError {
    fn is_user_actionable(&self) -> bool {
        match self {
            ScanError::Configuration { .. } => true,
            ScanError::Io { .. } => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ScanError::Configuration { message } => Some(message),
            _ => None,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
