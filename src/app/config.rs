//! TOML configuration
//!
//! Every key is optional. An explicitly named file must exist; otherwise the
//! default location under the user's config directory is used when present.

use crate::backend::api::{BackendKind, BackendOptions};
use crate::core::logging::LogFormat;
use crate::core::retry::RetryPolicy;
use crate::notifications::api::MqttSettings;
use crate::registry::api::RegistrySettings;
use crate::scanner::api::ScannerSettings;
use crate::zones::api::{default_regions, ZoneMap, ZoneRegion, MAX_MOVEMENT_WINDOW};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "Bleradar";
pub const CONFIG_FILE: &str = "bleradar.toml";
pub const IN_MEMORY_DATABASE: &str = ":memory:";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{message}")]
    File { path: PathBuf, message: String },

    #[error("{message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

impl crate::core::error_handling::ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::File { message, .. } | ConfigError::Invalid { message } => Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerSection {
    pub backends: Vec<String>,
    pub workers: usize,
    pub interval_secs: u64,
    pub pool_size: usize,
    pub grace_period_secs: u64,
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            backends: vec!["native".to_string()],
            workers: 1,
            interval_secs: 5,
            pool_size: 4,
            grace_period_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NativeSection {
    pub pass_secs: u64,
}

impl Default for NativeSection {
    fn default() -> Self {
        Self { pass_secs: 5 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSection {
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
    /// SQLite file, or `:memory:` for a store that lives as long as the run
    pub database: String,
    pub history_depth: usize,
    pub retention_days: u32,
    pub compact_threshold_bytes: u64,
    pub sweep_interval_secs: u64,
    pub page_size: usize,
}

impl Default for RegistrySection {
    fn default() -> Self {
        let defaults = RegistrySettings::default();
        Self {
            database: "bleradar.db".to_string(),
            history_depth: defaults.history_depth,
            retention_days: defaults.retention_days,
            compact_threshold_bytes: defaults.compact_threshold_bytes,
            sweep_interval_secs: 3600,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VendorSection {
    pub override_file: Option<PathBuf>,
    pub external_lookup: bool,
    pub lookup_url: String,
    pub lookup_timeout_secs: u64,
    pub memo_capacity: usize,
}

impl Default for VendorSection {
    fn default() -> Self {
        Self {
            override_file: Some(PathBuf::from("master_mac.csv")),
            external_lookup: false,
            lookup_url: "https://api.macvendors.com".to_string(),
            lookup_timeout_secs: 10,
            memo_capacity: crate::vendor::api::DEFAULT_MEMO_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsSection {
    pub subscriber_queue: usize,
    pub sink_queue: usize,
    pub log_events: bool,
    pub sighting_capacity: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            subscriber_queue: crate::notifications::api::DEFAULT_SUBSCRIBER_QUEUE,
            sink_queue: crate::notifications::api::DEFAULT_SINK_QUEUE,
            log_events: true,
            sighting_capacity: crate::graph::api::DEFAULT_SIGHTING_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MqttSection {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
}

impl Default for MqttSection {
    fn default() -> Self {
        let defaults = MqttSettings::default();
        Self {
            enabled: false,
            host: defaults.host,
            port: defaults.port,
            topic: defaults.topic,
            client_id: defaults.client_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZonesSection {
    pub movement_window: usize,
    pub regions: Vec<ZoneRegion>,
}

impl Default for ZonesSection {
    fn default() -> Self {
        Self {
            movement_window: crate::zones::api::DEFAULT_MOVEMENT_WINDOW,
            regions: default_regions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphSection {
    pub window_secs: u64,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            window_secs: crate::graph::api::DEFAULT_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: String,
    pub format: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub scanner: ScannerSection,
    pub native: NativeSection,
    /// Sniffer command lines keyed by tool name
    pub backends: BTreeMap<String, CommandSection>,
    pub registry: RegistrySection,
    pub vendor: VendorSection,
    pub events: EventsSection,
    pub mqtt: MqttSection,
    pub zones: ZonesSection,
    pub graph: GraphSection,
    pub logging: LoggingSection,
}

/// `<config dir>/Bleradar/bleradar.toml`, when the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Load settings from `path`, the default location, or built-in defaults
///
/// The result is not validated yet so command line overrides can be applied
/// first.
pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::File {
                    path: path.to_path_buf(),
                    message: format!(
                        "The specified configuration file does not exist: {}",
                        path.display()
                    ),
                });
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Settings::default()),
        },
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::File {
        path: path.clone(),
        message: format!("Error reading configuration file {}: {}", path.display(), e),
    })?;
    Settings::from_toml(&contents).map_err(|e| match e {
        ConfigError::Invalid { message } => ConfigError::File {
            message: format!("Error parsing configuration file {}: {}", path.display(), message),
            path,
        },
        other => other,
    })
}

impl Settings {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::invalid(e.to_string()))
    }

    /// Check every value the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scanner = &self.scanner;
        if scanner.backends.is_empty() {
            return Err(ConfigError::invalid("scanner.backends must name at least one backend"));
        }
        for name in &scanner.backends {
            name.parse::<BackendKind>()
                .map_err(|e| ConfigError::invalid(format!("scanner.backends: {}", e)))?;
        }
        if scanner.workers == 0 {
            return Err(ConfigError::invalid("scanner.workers must be at least 1"));
        }
        if scanner.pool_size == 0 {
            return Err(ConfigError::invalid("scanner.pool_size must be at least 1"));
        }
        if self.native.pass_secs == 0 {
            return Err(ConfigError::invalid("native.pass_secs must be at least 1"));
        }

        for (tool, section) in &self.backends {
            let kind: BackendKind = tool
                .parse()
                .map_err(|e| ConfigError::invalid(format!("[backends.{}]: {}", tool, e)))?;
            if kind.sniffer_tool().is_none() {
                return Err(ConfigError::invalid(format!(
                    "[backends.{}]: only sniffer backends take a command",
                    tool
                )));
            }
            if section.command.iter().all(|part| part.trim().is_empty()) {
                return Err(ConfigError::invalid(format!(
                    "backends.{}.command must not be empty",
                    tool
                )));
            }
        }

        let registry = &self.registry;
        if registry.database.trim().is_empty() {
            return Err(ConfigError::invalid("registry.database must not be empty"));
        }
        if registry.history_depth == 0 {
            return Err(ConfigError::invalid("registry.history_depth must be at least 1"));
        }
        if registry.page_size == 0 {
            return Err(ConfigError::invalid("registry.page_size must be at least 1"));
        }

        if self.vendor.memo_capacity == 0 {
            return Err(ConfigError::invalid("vendor.memo_capacity must be at least 1"));
        }
        if self.events.subscriber_queue == 0 || self.events.sink_queue == 0 {
            return Err(ConfigError::invalid("event queue sizes must be at least 1"));
        }
        if self.mqtt.enabled && self.mqtt.topic.trim().is_empty() {
            return Err(ConfigError::invalid("mqtt.topic must not be empty"));
        }
        if self.graph.window_secs == 0 {
            return Err(ConfigError::invalid("graph.window_secs must be at least 1"));
        }
        if !(2..=MAX_MOVEMENT_WINDOW).contains(&self.zones.movement_window) {
            return Err(ConfigError::invalid(format!(
                "zones.movement_window must be between 2 and {}",
                MAX_MOVEMENT_WINDOW
            )));
        }

        self.zone_map()?;
        self.log_format()?;
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid(format!(
                "logging.level '{}' is not one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    pub fn zone_map(&self) -> Result<ZoneMap, ConfigError> {
        ZoneMap::new(self.zones.regions.clone())
            .map_err(|e| ConfigError::invalid(format!("zones.regions: {}", e)))
    }

    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        self.logging
            .format
            .parse()
            .map_err(|e: String| ConfigError::invalid(format!("logging.format: {}", e)))
    }

    pub fn scanner_settings(&self) -> ScannerSettings {
        ScannerSettings {
            workers: self.scanner.workers,
            interval: Duration::from_secs(self.scanner.interval_secs),
            grace_period: Duration::from_secs(self.scanner.grace_period_secs),
            sweep_interval: Duration::from_secs(self.registry.sweep_interval_secs),
            retry: RetryPolicy::default(),
        }
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            history_depth: self.registry.history_depth,
            retention_days: self.registry.retention_days,
            compact_threshold_bytes: self.registry.compact_threshold_bytes,
        }
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            native_pass: Duration::from_secs(self.native.pass_secs),
            commands: self
                .backends
                .iter()
                .map(|(tool, section)| (tool.to_ascii_lowercase(), section.command.clone()))
                .collect(),
        }
    }

    pub fn mqtt_settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.mqtt.host.clone(),
            port: self.mqtt.port,
            topic: self.mqtt.topic.clone(),
            client_id: self.mqtt.client_id.clone(),
            ..MqttSettings::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.registry.database == IN_MEMORY_DATABASE
    }
}
