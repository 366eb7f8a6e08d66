//! Registry Error Types

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid device address: {address:?}")]
    InvalidAddress { address: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Stored record for {address} is corrupt: {message}")]
    Corrupt { address: String, message: String },

    #[error("Cannot open device database '{path}': {message}")]
    Open { path: String, message: String },

    #[error("Registry worker failed: {message}")]
    Worker { message: String },
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        RegistryError::Storage {
            message: e.to_string(),
        }
    }
}

impl From<crate::core::pool::PoolError> for RegistryError {
    fn from(e: crate::core::pool::PoolError) -> Self {
        RegistryError::Worker {
            message: e.to_string(),
        }
    }
}

impl crate::core::error_handling::ContextualError for RegistryError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, RegistryError::Open { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            RegistryError::Open { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
