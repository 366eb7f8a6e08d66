//! Command line arguments
//!
//! Flags override the matching configuration file keys.

use crate::app::config::Settings;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "bleradar")]
#[command(about = "Bluetooth LE advertisement scanner with device tracking and event fan-out")]
#[command(version)]
#[command(after_help = " * can be specified multiple times or as a comma-separated list")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Radio backends to scan with*: native, ubertooth, nrf, btlejack
    #[arg(
        short = 'b',
        long = "backend",
        value_name = "NAME",
        action = ArgAction::Append,
        value_delimiter = ','
    )]
    pub backends: Vec<String>,

    /// Scan workers per backend
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Seconds to wait between scan cycles
    #[arg(short = 'i', long = "interval", value_name = "SECS")]
    pub interval: Option<u64>,

    /// Device database file (':memory:' keeps state for this run only)
    #[arg(short = 'd', long = "database", value_name = "FILE")]
    pub database: Option<String>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force colored output
    #[arg(long = "color", action = ArgAction::SetTrue, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color", action = ArgAction::SetTrue)]
    pub no_color: bool,
}

impl Args {
    /// Copy every flag that was given into the settings
    pub fn apply_to(&self, settings: &mut Settings) {
        if !self.backends.is_empty() {
            settings.scanner.backends = self
                .backends
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
        }
        if let Some(workers) = self.workers {
            settings.scanner.workers = workers;
        }
        if let Some(interval) = self.interval {
            settings.scanner.interval_secs = interval;
        }
        if let Some(database) = &self.database {
            settings.registry.database = database.clone();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            settings.logging.format = format.clone();
        }
        if let Some(file) = &self.log_file {
            settings.logging.file = Some(file.clone());
        }
    }

    /// Flags win, then a non-empty `NO_COLOR`, then whether stdout is a terminal
    pub fn use_color(&self) -> bool {
        use std::io::IsTerminal;
        if self.no_color {
            return false;
        }
        if self.color {
            return true;
        }
        if std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty()) {
            return false;
        }
        std::io::stdout().is_terminal()
    }
}
