//! Zone configuration errors

#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    #[error("Zone '{name}' is invalid: {message}")]
    InvalidRegion { name: String, message: String },

    #[error("Zones '{first}' and '{second}' overlap")]
    Overlap { first: String, second: String },

    #[error("Zone '{name}' is defined more than once")]
    DuplicateName { name: String },
}

impl crate::core::error_handling::ContextualError for ZoneError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ZoneError::InvalidRegion { message, .. } => Some(message),
            ZoneError::Overlap { .. } => Some("zone regions overlap; each reading must map to at most one zone"),
            ZoneError::DuplicateName { .. } => Some("zone names must be unique"),
        }
    }
}

pub type ZoneResult<T> = Result<T, ZoneError>;
