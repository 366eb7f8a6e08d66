//! Top-level error for a pipeline run

use crate::app::config::ConfigError;
use crate::core::error_handling::ContextualError;
use crate::notifications::api::NotificationError;
use crate::registry::api::RegistryError;
use crate::scanner::api::ScanError;
use crate::vendor::api::VendorError;
use crate::zones::api::ZoneError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Zone(#[from] ZoneError),
}

impl AppError {
    fn inner(&self) -> &dyn ContextualError {
        match self {
            AppError::Config(e) => e,
            AppError::Scan(e) => e,
            AppError::Registry(e) => e,
            AppError::Vendor(e) => e,
            AppError::Notification(e) => e,
            AppError::Zone(e) => e,
        }
    }
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        self.inner().is_user_actionable()
    }

    fn user_message(&self) -> Option<&str> {
        self.inner().user_message()
    }
}
