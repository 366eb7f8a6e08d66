//! Error reporting helpers shared by every component
//!
//! Errors distinguish between problems an operator can fix (a bad backend
//! name, a missing sniffer binary, an invalid zone table) and transient system
//! faults (a sniffer exiting, a database write failing). The former are shown
//! verbatim, the latter are summarised with details pushed to debug level.

/// Trait for errors that can distinguish between operator-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if the message should be shown directly to the operator
    fn is_user_actionable(&self) -> bool;

    /// The operator-facing message for actionable errors
    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with a detail level matching its kind
///
/// # Examples
/// ```rust
/// # use bleradar::core::error_handling::log_error_with_context;
/// # use bleradar::scanner::api::ScanError;
/// let err = ScanError::Configuration { message: "unknown backend 'foo'".to_string() };
/// log_error_with_context(&err, "Starting scan workers");
/// // Logs: "FATAL: unknown backend 'foo'"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Log a recoverable error for a dropped unit of work
///
/// Used on the ingest path where a single observation may be lost without
/// affecting the pipeline.
pub fn log_dropped_work<E: ContextualError + std::fmt::Display>(error: &E, unit: &str) {
    if error.is_user_actionable() {
        log::warn!("Dropped {}: {}", unit, error);
    } else {
        log::debug!("Dropped {}: {}", unit, error);
    }
}
