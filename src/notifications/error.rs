//! Error types for the event bus

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationError {
    /// The bus has been shut down and accepts no new consumers
    Closed,
    DuplicateSink(String),
    MqttClient { message: String },
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationError::Closed => write!(f, "Event bus is shut down"),
            NotificationError::DuplicateSink(name) => {
                write!(f, "Event sink '{name}' is already registered")
            }
            NotificationError::MqttClient { message } => {
                write!(f, "MQTT client error: {message}")
            }
        }
    }
}

impl std::error::Error for NotificationError {}

impl crate::core::error_handling::ContextualError for NotificationError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type NotificationResult<T> = Result<T, NotificationError>;
