//! Process-per-call channel.
//!
//! Each call writes the command to a uniquely named scratch script, runs a
//! fresh interpreter on it, and collects stdout and stderr. The scratch file
//! is owned by a [`tempfile::TempPath`] and removed when the call returns,
//! whether it succeeded, failed or timed out. The interpreter is killed if
//! the call is abandoned.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ChannelError, ChannelKind, CommandChannel, CommandOutput, DEFAULT_COMMAND_TIMEOUT};

const SCRIPT_PREFIX: &str = "hotspot-monitor-";

/// Runs every command in a fresh interpreter process.
#[derive(Debug, Clone)]
pub struct ProcessChannel {
    program: String,
    args: Vec<String>,
    script_extension: String,
    scratch_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ProcessChannel {
    /// Creates a channel that runs `program args... <script>`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            script_extension: "sh".to_string(),
            scratch_dir: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the hard bound on a single call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Writes scratch scripts into `dir` instead of the system temp directory.
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    /// Extension given to scratch scripts (without the dot).
    pub fn with_script_extension(mut self, ext: impl Into<String>) -> Self {
        self.script_extension = ext.into();
        self
    }

    /// Call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    fn write_script(&self, command: &str) -> Result<tempfile::TempPath, ChannelError> {
        let dir = self.scratch_dir();
        let suffix = format!(".{}", self.script_extension.trim_start_matches('.'));
        let script_err = |source: std::io::Error| ChannelError::Script {
            dir: dir.clone(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix(SCRIPT_PREFIX)
            .suffix(&suffix)
            .tempfile_in(&dir)
            .map_err(script_err)?;
        file.write_all(command.as_bytes()).map_err(script_err)?;
        file.flush().map_err(script_err)?;
        Ok(file.into_temp_path())
    }
}

#[async_trait]
impl CommandChannel for ProcessChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Process
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        let script = self.write_script(command)?;
        debug!(program = %self.program, script = %script.display(), "running scratch script");

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&*script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ChannelError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    program = %self.program,
                    timeout = ?self.timeout,
                    "interpreter process timed out, killed"
                );
                return Err(ChannelError::Timeout(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut result = CommandOutput::from_streams(&stdout, &stderr);
        if !output.status.success() && !result.had_errors() {
            result.error = format!("interpreter exited with {}", output.status);
        }

        drop(script);
        Ok(result)
    }
}
