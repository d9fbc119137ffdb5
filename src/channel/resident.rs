//! Resident interpreter channel.
//!
//! One interpreter process is spawned lazily and kept alive across calls.
//! Each command is sent base64-encoded on a single stdin line, wrapped so the
//! interpreter prints a per-call end marker on both stdout and stderr once
//! the command finishes. Output is read up to the markers.
//!
//! Any failure while a command is in flight (I/O error, early exit, timeout)
//! discards the session; the next call spawns a new one.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ChannelError, ChannelKind, CommandChannel, CommandOutput, DEFAULT_COMMAND_TIMEOUT};
use crate::scripts::ShellDialect;

struct ResidentSession {
    // Held so the interpreter is killed when the session is dropped.
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: Lines<BufReader<ChildStderr>>,
}

impl ResidentSession {
    async fn run(&mut self, framed: &str, marker: &str) -> Result<CommandOutput, ChannelError> {
        self.stdin.write_all(framed.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;

        let (out, err) = tokio::try_join!(
            read_to_marker(&mut self.stdout, marker),
            read_to_marker(&mut self.stderr, marker)
        )?;
        Ok(CommandOutput::from_lines(out, err))
    }
}

async fn read_to_marker<R>(lines: &mut Lines<BufReader<R>>, marker: &str) -> Result<Vec<String>, ChannelError>
where
    R: AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    loop {
        match lines.next_line().await? {
            Some(line) if line.trim_end() == marker => return Ok(collected),
            Some(line) => collected.push(line),
            None => return Err(ChannelError::SessionClosed),
        }
    }
}

/// Wraps `command` so the interpreter decodes and runs it, then prints
/// `marker` on stdout and stderr. The result is a single line.
pub(crate) fn frame(dialect: ShellDialect, command: &str, marker: &str) -> String {
    let encoded = BASE64.encode(command.as_bytes());
    match dialect {
        ShellDialect::PowerShell => format!(
            "$__hm = [System.Text.Encoding]::UTF8.GetString([System.Convert]::FromBase64String('{encoded}')); \
             try {{ Invoke-Expression $__hm 2>&1 | ForEach-Object {{ \
             if ($_ -is [System.Management.Automation.ErrorRecord]) {{ [Console]::Error.WriteLine($_.ToString()) }} \
             else {{ $_ | Out-String -Stream | ForEach-Object {{ [Console]::Out.WriteLine($_) }} }} }} }} \
             catch {{ [Console]::Error.WriteLine($_.Exception.Message) }}; \
             [Console]::Out.WriteLine('{marker}'); [Console]::Error.WriteLine('{marker}'); \
             [Console]::Out.Flush(); [Console]::Error.Flush()"
        ),
        ShellDialect::Posix => format!(
            "eval \"$(printf '%s' '{encoded}' | base64 -d)\" </dev/null; \
             printf '\\n%s\\n' '{marker}'; printf '\\n%s\\n' '{marker}' >&2"
        ),
    }
}

fn new_marker() -> String {
    format!("__HOTSPOT_MONITOR_END_{}__", Uuid::new_v4().simple())
}

/// Runs commands in one long-lived interpreter session.
pub struct ResidentChannel {
    program: String,
    args: Vec<String>,
    dialect: ShellDialect,
    timeout: Duration,
    session: Mutex<Option<ResidentSession>>,
}

impl std::fmt::Debug for ResidentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidentChannel")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("dialect", &self.dialect)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ResidentChannel {
    /// Creates a channel that will spawn `program args...` on first use.
    pub fn new(program: impl Into<String>, args: Vec<String>, dialect: ShellDialect) -> Self {
        Self {
            program: program.into(),
            args,
            dialect,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            session: Mutex::new(None),
        }
    }

    /// Sets the bound on a single call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `true` if an interpreter session is currently alive.
    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    fn spawn(&self) -> Result<ResidentSession, ChannelError> {
        debug!(program = %self.program, "spawning resident interpreter");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ChannelError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(ChannelError::SessionClosed)?;
        let stdout = child.stdout.take().ok_or(ChannelError::SessionClosed)?;
        let stderr = child.stderr.take().ok_or(ChannelError::SessionClosed)?;

        Ok(ResidentSession {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr: BufReader::new(stderr).lines(),
        })
    }
}

#[async_trait]
impl CommandChannel for ResidentChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Resident
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(ChannelError::SessionClosed);
        };

        let marker = new_marker();
        let framed = frame(self.dialect, command, &marker);

        let result = tokio::time::timeout(self.timeout, session.run(&framed, &marker)).await;
        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                warn!(error = %e, "resident session failed, discarding");
                *guard = None;
                Err(e)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "resident command timed out, discarding session");
                *guard = None;
                Err(ChannelError::Timeout(self.timeout))
            }
        }
    }
}
