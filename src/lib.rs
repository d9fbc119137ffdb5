//! Hotspot Monitor library
//!
//! This crate keeps a host-local network sharing feature ("hotspot") alive.
//! A background worker periodically probes the hotspot, restarts it when it
//! has silently stopped, and reports how many client devices are attached.
//!
//! Commands reach the host through one of two channels: a resident
//! interpreter session that is reused across calls, or a fresh interpreter
//! process per call. Which one works for a given class of command is
//! detected lazily and remembered for the lifetime of the process.

use std::fmt;

/// Configuration loading, schema and XDG path resolution.
pub mod config;

/// Foreground service runner: runtime, signals and logging.
pub mod daemon;

/// Command execution channels and the strategy that picks between them.
pub mod channel;

/// Parsers for the text output of hotspot queries.
pub mod parser;

/// Default command payloads for each supported shell dialect.
pub mod scripts;

/// Lifecycle controller and reconciliation loop.
pub mod worker;

/// Title used in human-readable status lines.
pub const APP_TITLE: &str = "Hotspot Monitor";

/// Maximum length of a status line (tray tooltip limit).
pub const STATUS_LINE_MAX_LEN: usize = 63;

/// Client count sentinel: no observation has been made yet.
pub const COUNT_NOT_OBSERVED: i32 = -2;

/// Client count sentinel: the count query failed or the feature is unavailable.
///
/// Observers must treat this as "unknown", never as zero clients.
pub const COUNT_UNAVAILABLE: i32 = -1;

/// A client device attached to the hotspot.
///
/// Produced fresh by every enumeration; never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectedClient {
    /// Upper-cased MAC address, colon or hyphen separated as reported.
    pub mac_address: String,
    /// Best-effort display name (may be empty).
    pub device_name: String,
    /// Comma-joined list of IP addresses (may be empty).
    pub ip_addresses: String,
}

impl ConnectedClient {
    /// Renders the client as a tab-separated `Device\tIP\tMAC` row.
    pub fn to_row(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.device_name, self.ip_addresses, self.mac_address
        )
    }
}

/// Notification emitted when the observed client count changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClientCountChanged {
    /// The newly observed count, or [`COUNT_UNAVAILABLE`].
    pub count: i32,
}

/// Lifecycle state of a worker's reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No loop is running.
    Stopped,
    /// The loop is running.
    Running,
    /// Cancellation was signalled and deactivation is in progress.
    StopRequested,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Stopped => "stopped",
            LoopState::Running => "running",
            LoopState::StopRequested => "stop-requested",
        };
        write!(f, "{}", s)
    }
}

/// Formats the one-line status shown to users, e.g.
/// `Hotspot Monitor: Running (3 devices)`.
///
/// Counts below zero are sentinels and are omitted. The result is truncated
/// to [`STATUS_LINE_MAX_LEN`] characters.
pub fn status_line(running: bool, device_count: Option<i32>) -> String {
    let state = if running { "Running" } else { "Stopped" };
    let count_text = match device_count {
        Some(n) if n >= 0 => format!(" ({} device{})", n, if n == 1 { "" } else { "s" }),
        _ => String::new(),
    };
    let line = format!("{APP_TITLE}: {state}{count_text}");
    line.chars().take(STATUS_LINE_MAX_LEN).collect()
}
