//! Logging initialization for the hotspot monitor.
//!
//! Configures the `tracing` subscriber with level filtering via the
//! `HOTSPOT_LOG` environment variable, falling back to the configured
//! `daemon.log_level`.
//!
//! # Usage
//!
//! ```bash
//! # Configured level (info by default)
//! hotspot-monitor run
//!
//! # Debug level
//! HOTSPOT_LOG=debug hotspot-monitor run
//!
//! # Module-specific filtering
//! HOTSPOT_LOG=hotspot_monitor::channel=trace,info hotspot-monitor run
//! ```

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::schema::TomlDaemonConfig;
use crate::config::xdg;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "HOTSPOT_LOG";

/// Builds the filter: `HOTSPOT_LOG` when set and valid, else `fallback`.
pub fn build_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Initialize the tracing subscriber.
///
/// Output goes to stderr, or is appended to `daemon.log_file` when set.
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init(config: &TomlDaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_filter(config.log_level.as_filter());

    let log_file = config.log_file.trim();
    if log_file.is_empty() {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| -> Box<dyn std::error::Error> { e })?;
        return Ok(());
    }

    let path = xdg::expand_tilde(log_file);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;
    Ok(())
}
