//! Command execution channels.
//!
//! A [`CommandChannel`] runs an opaque script against the host and returns
//! its output lines and error text. Two implementations exist:
//!
//! - [`ResidentChannel`]: one long-lived interpreter session reused across
//!   calls. Cheap, but may lack a capability some scripts need.
//! - [`ProcessChannel`]: a fresh interpreter process per call, fed through a
//!   private scratch script. Always capable, slower, bounded by a hard timeout.
//!
//! [`ChannelDispatcher`] picks between them per call using the
//! [`CapabilityCache`].

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod capability;
pub mod dispatch;
pub mod process;
pub mod resident;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{CapabilityCache, CapabilityClass, ChannelCapability};
pub use dispatch::ChannelDispatcher;
pub use process::ProcessChannel;
pub use resident::ResidentChannel;

/// Default hard bound on a single channel call.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Which execution strategy a channel implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Reused interpreter session.
    Resident,
    /// Fresh interpreter process per call.
    Process,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Resident => write!(f, "resident"),
            ChannelKind::Process => write!(f, "process"),
        }
    }
}

/// Output of a command: non-blank stdout lines plus collected error text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Non-blank output lines with trailing whitespace removed.
    pub lines: Vec<String>,
    /// Error text reported by the interpreter (empty when none).
    pub error: String,
}

impl CommandOutput {
    /// Builds an output from already split stdout and stderr lines.
    pub fn from_lines<I, J>(stdout: I, stderr: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        let lines = stdout
            .into_iter()
            .map(|l| l.trim_end().to_string())
            .filter(|l| !l.trim().is_empty())
            .collect();
        let error = stderr
            .into_iter()
            .map(|l| l.trim_end().to_string())
            .filter(|l| !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Self { lines, error }
    }

    /// Builds an output from raw stdout and stderr text.
    pub fn from_streams(stdout: &str, stderr: &str) -> Self {
        Self::from_lines(
            stdout.lines().map(str::to_string),
            stderr.lines().map(str::to_string),
        )
    }

    /// Returns `true` if the interpreter reported any error text.
    pub fn had_errors(&self) -> bool {
        !self.error.trim().is_empty()
    }

    /// Output lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Errors raised by a channel call.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The interpreter process could not be started.
    #[error("Failed to spawn interpreter '{program}'")]
    Spawn {
        /// Interpreter program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The scratch script for a process call could not be written.
    #[error("Failed to write scratch script in {dir}")]
    Script {
        /// Directory the script was written to.
        dir: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the interpreter failed.
    #[error("Interpreter I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The call exceeded its time bound and was abandoned.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The resident session exited while a command was running.
    #[error("Resident session closed unexpectedly")]
    SessionClosed,
}

impl ChannelError {
    /// Returns `true` if the error is a timeout.
    ///
    /// A timeout fails the call but never demotes a channel.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChannelError::Timeout(_))
    }
}

/// Executes opaque command payloads against the host.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Strategy implemented by this channel.
    fn kind(&self) -> ChannelKind;

    /// Runs `command` and returns its output.
    ///
    /// Error text printed by the command is returned inside
    /// [`CommandOutput::error`]; `Err` is reserved for failures of the
    /// channel itself (spawn, I/O, timeout, dead session).
    async fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError>;
}
