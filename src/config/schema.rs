//! TOML configuration schema types.
//!
//! Every section uses `#[serde(default)]` so a partial (or empty) file is
//! valid and missing keys take the defaults below. Durations are kept as
//! humantime strings and resolved by [`Config::monitor_settings`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::config::xdg;
use crate::scripts::ShellDialect;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Reconciliation loop settings.
    pub monitor: MonitorConfig,
    /// Resident interpreter session.
    pub resident: ResidentConfig,
    /// Process-per-call interpreter.
    pub process: ProcessConfig,
    /// Command payload overrides.
    pub commands: CommandsConfig,
    /// Logging.
    pub daemon: TomlDaemonConfig,
}

/// `[monitor]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sleep between loop iterations (humantime, e.g. `"5s"`).
    pub poll_interval: String,
    /// Hard bound on a single channel call.
    pub command_timeout: String,
    /// Literal the status query must report for the hotspot to count as healthy.
    pub expected_status: String,
    /// Shell dialect of the interpreters and default payloads.
    pub dialect: ShellDialect,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: "5s".to_string(),
            command_timeout: "30s".to_string(),
            expected_status: "Up".to_string(),
            dialect: ShellDialect::default(),
        }
    }
}

/// `[resident]` section. Empty `program` means the dialect default.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ResidentConfig {
    /// Interpreter executable.
    pub program: String,
    /// Arguments that make the interpreter read commands from stdin.
    pub args: Vec<String>,
}

/// `[process]` section. Empty `program` means the dialect default.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProcessConfig {
    /// Interpreter executable.
    pub program: String,
    /// Arguments placed before the scratch script path.
    pub args: Vec<String>,
    /// Scratch script extension, without the dot.
    pub script_extension: String,
    /// Directory for scratch scripts. Empty means the system temp directory.
    pub scratch_dir: String,
}

/// `[commands]` section. Empty entries keep the dialect's built-in payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Status query override.
    pub status: String,
    /// Start command override.
    pub start: String,
    /// Stop command override.
    pub stop: String,
    /// Client listing override.
    pub list_clients: String,
    /// Client count override.
    pub count_clients: String,
}

/// `[daemon]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TomlDaemonConfig {
    /// Log verbosity. Overridden by `HOTSPOT_LOG`.
    pub log_level: LogLevel,
    /// Path to log file. Empty string means stderr.
    pub log_file: String,
}

impl Default for TomlDaemonConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_file: String::new(),
        }
    }
}

/// Log verbosity levels (kebab-case in TOML).
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// Informational messages (default).
    Info,
    /// Debug-level detail.
    Debug,
    /// Full trace output.
    Trace,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// `[monitor]` with durations parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Sleep between loop iterations.
    pub poll_interval: Duration,
    /// Hard bound on a single channel call.
    pub command_timeout: Duration,
    /// Healthy status literal.
    pub expected_status: String,
    /// Shell dialect.
    pub dialect: ShellDialect,
}

/// Interpreter program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    /// Executable.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
}

fn interpreter(program: &str, args: &[String], default: (&str, &[&str])) -> Interpreter {
    if program.trim().is_empty() {
        let args = if args.is_empty() {
            default.1.iter().map(|a| a.to_string()).collect()
        } else {
            args.to_vec()
        };
        Interpreter {
            program: default.0.to_string(),
            args,
        }
    } else {
        Interpreter {
            program: program.to_string(),
            args: args.to_vec(),
        }
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration = humantime::parse_duration(value.trim()).map_err(|e| {
        ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
            message: e.to_string(),
        }
    })?;
    if duration.is_zero() {
        return Err(ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(duration)
}

impl Config {
    /// Parses the `[monitor]` durations.
    pub fn monitor_settings(&self) -> Result<MonitorSettings, ConfigError> {
        Ok(MonitorSettings {
            poll_interval: parse_duration("monitor.poll_interval", &self.monitor.poll_interval)?,
            command_timeout: parse_duration(
                "monitor.command_timeout",
                &self.monitor.command_timeout,
            )?,
            expected_status: self.monitor.expected_status.clone(),
            dialect: self.monitor.dialect,
        })
    }

    /// Resident interpreter, falling back to the dialect default.
    pub fn resident_interpreter(&self) -> Interpreter {
        let default: (&str, &[&str]) = match self.monitor.dialect {
            ShellDialect::PowerShell => (
                "pwsh",
                &["-NoLogo", "-NoProfile", "-NonInteractive", "-Command", "-"],
            ),
            ShellDialect::Posix => ("sh", &["-s"]),
        };
        interpreter(&self.resident.program, &self.resident.args, default)
    }

    /// Process-per-call interpreter, falling back to the dialect default.
    pub fn process_interpreter(&self) -> Interpreter {
        let default: (&str, &[&str]) = match self.monitor.dialect {
            ShellDialect::PowerShell => (
                "powershell.exe",
                &[
                    "-NoLogo",
                    "-NoProfile",
                    "-NonInteractive",
                    "-ExecutionPolicy",
                    "Bypass",
                    "-File",
                ],
            ),
            ShellDialect::Posix => ("sh", &[]),
        };
        interpreter(&self.process.program, &self.process.args, default)
    }

    /// Scratch script extension, falling back to the dialect default.
    pub fn script_extension(&self) -> String {
        let ext = self.process.script_extension.trim().trim_start_matches('.');
        if !ext.is_empty() {
            return ext.to_string();
        }
        match self.monitor.dialect {
            ShellDialect::PowerShell => "ps1".to_string(),
            ShellDialect::Posix => "sh".to_string(),
        }
    }

    /// Scratch directory with `~` expanded, or `None` for the system temp dir.
    pub fn scratch_dir(&self) -> Option<PathBuf> {
        let dir = self.process.scratch_dir.trim();
        (!dir.is_empty()).then(|| xdg::expand_tilde(dir))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
