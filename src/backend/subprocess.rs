//! Backends driven by an external sniffer process
//!
//! The sniffer's stdout is read line by line; stderr and stdin are detached.
//! The child is killed and reaped when the source is closed, when its output
//! ends, and (as a last resort) when the source is dropped.

use crate::backend::parsers::{parse_btlejack_line, parse_nrf_line, parse_ubertooth_line};
use crate::backend::traits::{PacketSource, RadioBackend};
use crate::backend::types::{Capabilities, RawPacket};
use crate::scanner::error::{ScanError, ScanResult};
use async_trait::async_trait;
use chrono::Utc;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

/// External sniffer tools with a known output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnifferTool {
    Ubertooth,
    Nrf,
    Btlejack,
}

impl SnifferTool {
    pub fn name(&self) -> &'static str {
        match self {
            SnifferTool::Ubertooth => "ubertooth",
            SnifferTool::Nrf => "nrf",
            SnifferTool::Btlejack => "btlejack",
        }
    }

    pub fn default_command(&self) -> Vec<String> {
        let argv: &[&str] = match self {
            SnifferTool::Ubertooth => &["ubertooth-btle", "-f"],
            SnifferTool::Nrf => &["nrf_sniffer"],
            SnifferTool::Btlejack => &["btlejack", "-s"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }

    pub fn parse_line(&self, line: &str) -> RawPacket {
        let now = Utc::now();
        match self {
            SnifferTool::Ubertooth => parse_ubertooth_line(line, now),
            SnifferTool::Nrf => parse_nrf_line(line, now),
            SnifferTool::Btlejack => parse_btlejack_line(line, now),
        }
    }
}

pub struct SubprocessBackend {
    tool: SnifferTool,
    command: Vec<String>,
}

impl SubprocessBackend {
    pub fn new(tool: SnifferTool, command: Vec<String>) -> ScanResult<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(ScanError::Configuration {
                message: format!("empty command configured for the {} backend", tool.name()),
            });
        }
        Ok(Self { tool, command })
    }

    pub fn with_default_command(tool: SnifferTool) -> Self {
        Self {
            tool,
            command: tool.default_command(),
        }
    }

    pub fn tool(&self) -> SnifferTool {
        self.tool
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Start the sniffer and return its concrete packet source
    pub fn spawn(&self) -> ScanResult<SubprocessSource> {
        let program = &self.command[0];

        let mut child = Command::new(program)
            .args(&self.command[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ScanError::Configuration {
                    message: format!(
                        "sniffer binary '{}' for the {} backend was not found",
                        program,
                        self.tool.name()
                    ),
                },
                std::io::ErrorKind::PermissionDenied => ScanError::Configuration {
                    message: format!("sniffer binary '{}' is not executable", program),
                },
                _ => ScanError::Io {
                    message: format!("failed to start '{}': {}", program, e),
                },
            })?;

        let stdout = child.stdout.take().ok_or_else(|| ScanError::Io {
            message: format!("'{}' started without a stdout pipe", program),
        })?;

        log::info!(
            "Started {} sniffer '{}' (pid {:?})",
            self.tool.name(),
            program,
            child.id()
        );

        Ok(SubprocessSource {
            tool: self.tool,
            child: Some(child),
            reader: BufReader::new(stdout),
            buffer: Vec::with_capacity(256),
        })
    }
}

#[async_trait]
impl RadioBackend for SubprocessBackend {
    fn name(&self) -> &str {
        self.tool.name()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ADVERTISING
    }

    async fn scan(&self) -> ScanResult<Box<dyn PacketSource>> {
        Ok(Box::new(self.spawn()?))
    }
}

pub struct SubprocessSource {
    tool: SnifferTool,
    child: Option<Child>,
    reader: BufReader<ChildStdout>,
    buffer: Vec<u8>,
}

impl SubprocessSource {
    /// OS process id while the sniffer is running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.id())
    }

    async fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            match child.wait().await {
                Ok(status) => log::debug!("{} sniffer exited: {}", self.tool.name(), status),
                Err(e) => log::warn!("Failed to reap {} sniffer: {}", self.tool.name(), e),
            }
        }
    }
}

#[async_trait]
impl PacketSource for SubprocessSource {
    async fn next_packet(&mut self) -> Option<RawPacket> {
        self.child.as_ref()?;

        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer).await {
                Ok(0) => {
                    self.reap().await;
                    return None;
                }
                Ok(_) => {
                    let text = String::from_utf8_lossy(&self.buffer);
                    let line = text.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Some(self.tool.parse_line(line));
                }
                Err(e) => {
                    log::debug!("{} sniffer output unreadable: {}", self.tool.name(), e);
                    self.reap().await;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        self.reap().await;
    }
}
