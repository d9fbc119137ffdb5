//! Hotspot worker: lifecycle controller and on-demand queries.
//!
//! [`HotspotWorker`] owns one reconciliation loop at a time. `start()` spawns
//! it on the current tokio runtime with a fresh cancellation token; `stop()`
//! cancels the token, waits for the loop to exit and then deactivates the
//! hotspot. Both are idempotent and never return an error.
//!
//! Client count changes are broadcast as [`ClientCountChanged`] to every
//! subscriber. The last observed count is owned by the worker and written
//! only by the loop.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelDispatcher, ChannelError, CommandOutput, ProcessChannel, ResidentChannel};
use crate::config::{Config, ConfigError};
use crate::parser;
use crate::scripts::{CommandRole, HotspotCommands};
use crate::{ClientCountChanged, ConnectedClient, LoopState, COUNT_NOT_OBSERVED, COUNT_UNAVAILABLE};

mod reconcile;

#[cfg(test)]
mod tests;

/// Capacity of the client count broadcast channel.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Default sleep between loop iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Error surfaced to front ends by on-demand queries.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The query could not be completed.
    #[error("Failed to {action}: {message}")]
    Query {
        /// What was being attempted.
        action: &'static str,
        /// Human-readable reason.
        message: String,
    },
}

/// Loop timing and health criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    /// Sleep between iterations.
    pub poll_interval: Duration,
    /// Status literal that means healthy.
    pub expected_status: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            expected_status: "Up".to_string(),
        }
    }
}

/// State shared between the controller, the loop task and on-demand queries.
struct WorkerInner {
    dispatcher: ChannelDispatcher,
    commands: HotspotCommands,
    settings: WorkerSettings,
    last_count: AtomicI32,
    update_tx: broadcast::Sender<ClientCountChanged>,
}

impl WorkerInner {
    async fn run_role(&self, role: CommandRole) -> Result<CommandOutput, ChannelError> {
        self.dispatcher
            .run(role.class(), self.commands.get(role))
            .await
    }

    async fn check_status(&self) -> bool {
        match self.run_role(CommandRole::Status).await {
            Ok(output) => parser::parse_status(&output.lines, &self.settings.expected_status),
            Err(e) => {
                warn!(error = %e, "status query failed");
                false
            }
        }
    }

    async fn query_count(&self) -> i32 {
        match self.run_role(CommandRole::CountClients).await {
            Ok(output) => parser::parse_count(&output.lines),
            Err(e) => {
                warn!(error = %e, "client count query failed");
                COUNT_UNAVAILABLE
            }
        }
    }

    async fn query_clients(&self) -> Result<Vec<ConnectedClient>, WorkerError> {
        let output = self
            .run_role(CommandRole::ListClients)
            .await
            .map_err(|e| WorkerError::Query {
                action: "list connected clients",
                message: e.to_string(),
            })?;
        if output.lines.is_empty() && output.had_errors() {
            return Err(WorkerError::Query {
                action: "list connected clients",
                message: output.error,
            });
        }
        Ok(parser::parse_clients(&output.lines))
    }

    async fn deactivate(&self) {
        match self.run_role(CommandRole::Stop).await {
            Ok(output) if output.had_errors() => {
                error!(error = %output.error, "failed to deactivate hotspot")
            }
            Ok(output) => info!(output = %output.text(), "hotspot deactivated"),
            Err(e) => error!(error = %e, "failed to deactivate hotspot"),
        }
    }
}

#[derive(Debug)]
struct Control {
    state: LoopState,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// Keeps the hotspot alive and reports attached clients.
pub struct HotspotWorker {
    inner: Arc<WorkerInner>,
    control: Mutex<Control>,
}

impl HotspotWorker {
    /// Creates a stopped worker.
    pub fn new(
        dispatcher: ChannelDispatcher,
        commands: HotspotCommands,
        settings: WorkerSettings,
    ) -> Self {
        let (update_tx, _rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(WorkerInner {
                dispatcher,
                commands,
                settings,
                last_count: AtomicI32::new(COUNT_NOT_OBSERVED),
                update_tx,
            }),
            control: Mutex::new(Control {
                state: LoopState::Stopped,
                cancel: None,
                handle: None,
            }),
        }
    }

    /// Builds the channels, payloads and settings described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let monitor = config.monitor_settings()?;
        let commands = HotspotCommands::from_config(monitor.dialect, &config.commands);

        let resident = config.resident_interpreter();
        let resident = ResidentChannel::new(resident.program, resident.args, commands.dialect())
            .with_timeout(monitor.command_timeout);

        let process = config.process_interpreter();
        let process = ProcessChannel::new(process.program, process.args)
            .with_timeout(monitor.command_timeout)
            .with_script_extension(config.script_extension())
            .with_scratch_dir(config.scratch_dir());

        let dispatcher =
            ChannelDispatcher::new(Arc::new(resident), Arc::new(process), commands.dialect());

        Ok(Self::new(
            dispatcher,
            commands,
            WorkerSettings {
                poll_interval: monitor.poll_interval,
                expected_status: monitor.expected_status,
            },
        ))
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts the reconciliation loop if it is not already running.
    ///
    /// Must be called from within a tokio runtime; otherwise the call is
    /// logged and ignored.
    pub fn start(&self) {
        let mut control = self.control();
        if control.state != LoopState::Stopped {
            debug!(state = %control.state, "start ignored");
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "cannot start worker outside a tokio runtime");
                return;
            }
        };

        let token = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let loop_token = token.clone();
        control.handle = Some(runtime.spawn(reconcile::run_loop(inner, loop_token)));
        control.cancel = Some(token);
        control.state = LoopState::Running;
        info!("worker started");
    }

    /// Stops the loop and deactivates the hotspot.
    ///
    /// Returns once the loop has exited and deactivation was attempted. A
    /// command already in flight is allowed to finish.
    pub async fn stop(&self) {
        let (cancel, handle) = {
            let mut control = self.control();
            if control.state != LoopState::Running {
                debug!(state = %control.state, "stop ignored");
                return;
            }
            control.state = LoopState::StopRequested;
            (control.cancel.take(), control.handle.take())
        };

        if let Some(token) = cancel {
            token.cancel();
        }
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "reconciliation loop ended abnormally");
            }
        }

        self.inner.deactivate().await;

        self.control().state = LoopState::Stopped;
        info!("worker stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.control().state
    }

    /// Returns `true` while the loop is running.
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Subscribes to client count changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientCountChanged> {
        self.inner.update_tx.subscribe()
    }

    /// Count stored by the loop: `-2` before the first observation, `-1`
    /// when the last query failed.
    pub fn last_known_client_count(&self) -> i32 {
        self.inner.last_count.load(Ordering::SeqCst)
    }

    /// Runs the status query once. Failure counts as unhealthy.
    pub async fn check_status(&self) -> bool {
        self.inner.check_status().await
    }

    /// Queries the client count once, or `-1` when unavailable.
    pub async fn connected_client_count(&self) -> i32 {
        self.inner.query_count().await
    }

    /// Lists attached clients, or an empty list when the query fails.
    pub async fn connected_clients(&self) -> Vec<ConnectedClient> {
        self.fetch_connected_clients().await.unwrap_or_else(|e| {
            warn!(error = %e, "client listing failed");
            Vec::new()
        })
    }

    /// Lists attached clients, reporting failure with a readable message.
    pub async fn fetch_connected_clients(&self) -> Result<Vec<ConnectedClient>, WorkerError> {
        self.inner.query_clients().await
    }
}

impl Drop for HotspotWorker {
    fn drop(&mut self) {
        let control = self.control.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = control.cancel.take() {
            token.cancel();
        }
    }
}
