//! Radio backends
//!
//! The backend set is closed: the platform stack (`native`) and three
//! external sniffers (`ubertooth`, `nrf`, `btlejack`). All of them hand the
//! scanner the same [`traits::PacketSource`] stream of raw packets.

pub(crate) mod native;
pub(crate) mod parsers;
pub(crate) mod subprocess;
pub(crate) mod traits;
pub(crate) mod types;

pub mod api;

use crate::scanner::error::{ScanError, ScanResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use subprocess::{SnifferTool, SubprocessBackend};
use traits::RadioBackend;

#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Native,
    Ubertooth,
    Nrf,
    Btlejack,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Ubertooth => "ubertooth",
            Self::Nrf => "nrf",
            Self::Btlejack => "btlejack",
        }
    }

    pub fn sniffer_tool(&self) -> Option<SnifferTool> {
        match self {
            Self::Native => None,
            Self::Ubertooth => Some(SnifferTool::Ubertooth),
            Self::Nrf => Some(SnifferTool::Nrf),
            Self::Btlejack => Some(SnifferTool::Btlejack),
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::iter().map(|kind| kind.name()).collect()
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ScanError::Configuration {
                message: format!(
                    "unknown radio backend '{}' (expected one of: {})",
                    s,
                    Self::names().join(", ")
                ),
            })
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings the backend factory needs
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Length of one native discovery pass
    pub native_pass: Duration,
    /// Command line per sniffer tool name; missing tools use their default
    pub commands: HashMap<String, Vec<String>>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            native_pass: Duration::from_secs(5),
            commands: HashMap::new(),
        }
    }
}

/// Build a backend by name
///
/// Unknown names, empty commands and a `native` request in a build without
/// platform Bluetooth support are configuration errors.
pub async fn create_backend(
    name: &str,
    options: &BackendOptions,
) -> ScanResult<Arc<dyn RadioBackend>> {
    let kind: BackendKind = name.parse()?;

    match kind.sniffer_tool() {
        Some(tool) => {
            let backend = match options.commands.get(tool.name()) {
                Some(command) => SubprocessBackend::new(tool, command.clone())?,
                None => SubprocessBackend::with_default_command(tool),
            };
            Ok(Arc::new(backend))
        }
        None => create_native(options).await,
    }
}

#[cfg(feature = "native-btleplug")]
async fn create_native(options: &BackendOptions) -> ScanResult<Arc<dyn RadioBackend>> {
    let backend = native::NativeBackend::platform(options.native_pass).await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "native-btleplug"))]
async fn create_native(_options: &BackendOptions) -> ScanResult<Arc<dyn RadioBackend>> {
    Err(ScanError::Configuration {
        message: "the native backend is not available in this build (enable the \
                  'native-btleplug' feature) - use a sniffer backend instead"
            .to_string(),
    })
}
