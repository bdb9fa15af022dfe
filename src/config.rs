// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Logger configuration.
//!
//! JSON5 file format; every field is optional and falls back to the default
//! shown in [`LogConfig::default`]:
//!
//! ```json5
//! {
//!     // daemonized: blank lines are dropped, the `L` column is hidden
//!     daemon: true,
//!     store_lines: 1024,
//!     eviction: "half_rotation",
//!     syslog_facility: "local0",
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::logging::{Eviction, SyslogFacility, DEFAULT_LINE_LEN, DEFAULT_SCRATCH_LEN};

/// Number of lines retained by the shared line store unless configured
pub const DEFAULT_STORE_LINES: usize = 1024;

/// Frames printed per backtrace
pub const DEFAULT_BACKTRACE_DEPTH: usize = 20;

/// Pause before exiting after a panic so the system logger can record it
pub const DEFAULT_EXIT_PAUSE_MS: u64 = 1000;

/// Startup configuration for the logging subsystem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Running detached from a terminal
    pub daemon: bool,

    /// Mirror LOG lines to syslog even in the foreground
    pub log_foreground: bool,

    /// Mirror every routed line to syslog, not only LOG lines
    pub log_all: bool,

    /// Retain ordinary lines in the store while daemonized.
    /// When false only lines mirrored to syslog are retained.
    pub retain_ordinary: bool,

    /// Slots in the shared line store
    pub store_lines: usize,

    /// Bytes per slot, terminator included
    pub line_len: usize,

    /// Bytes of scratch for building one line across calls
    pub scratch_len: usize,

    /// Overflow policy of the line store
    pub eviction: Eviction,

    /// `openlog(3)` identity
    pub syslog_ident: String,

    pub syslog_facility: SyslogFacility,

    pub backtrace_depth: usize,

    pub exit_pause_ms: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            daemon: false,
            log_foreground: false,
            log_all: false,
            retain_ordinary: true,
            store_lines: DEFAULT_STORE_LINES,
            line_len: DEFAULT_LINE_LEN,
            scratch_len: DEFAULT_SCRATCH_LEN,
            eviction: Eviction::HalfRotation,
            syslog_ident: "sdrlog".to_string(),
            syslog_facility: SyslogFacility::Daemon,
            backtrace_depth: DEFAULT_BACKTRACE_DEPTH,
            exit_pause_ms: DEFAULT_EXIT_PAUSE_MS,
        }
    }
}

impl LogConfig {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration (JSON is valid JSON5)
    pub fn to_json5(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json5())
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))
    }

    /// Panic reports go to syslog in these modes
    pub fn mirrors_to_syslog(&self) -> bool {
        self.daemon || self.log_foreground
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_lines < 2 {
            return Err(ConfigError::InvalidValue {
                field: "store_lines",
                reason: format!("need at least 2 slots, got {}", self.store_lines),
            });
        }
        if self.store_lines > u32::MAX as usize {
            return Err(ConfigError::InvalidValue {
                field: "store_lines",
                reason: format!("{} slots exceed the shared index range", self.store_lines),
            });
        }
        // room for at least one character, the newline and the terminator
        if self.line_len < 3 || self.line_len > u16::MAX as usize {
            return Err(ConfigError::InvalidValue {
                field: "line_len",
                reason: format!("must be within 3..=65535, got {}", self.line_len),
            });
        }
        if self.scratch_len < 2 {
            return Err(ConfigError::InvalidValue {
                field: "scratch_len",
                reason: format!("must be at least 2, got {}", self.scratch_len),
            });
        }
        if self.backtrace_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backtrace_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.syslog_ident.is_empty() || self.syslog_ident.contains('\0') {
            return Err(ConfigError::InvalidValue {
                field: "syslog_ident",
                reason: "must be non-empty and contain no NUL".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    IoError(std::path::PathBuf, String),
    ParseError(String),
    InvalidValue { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, msg) => {
                write!(
                    f,
                    "failed to read config file '{}': {}",
                    path.display(),
                    msg
                )
            }
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
