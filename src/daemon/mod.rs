//! Foreground service runner.
//!
//! Builds the tokio runtime, starts the [`HotspotWorker`], prints a status
//! line whenever the client count changes and stops (deactivating the
//! hotspot) on SIGINT or SIGTERM.

pub mod logging;

use std::error::Error;
use std::future::Future;

use tokio::runtime::Runtime;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::worker::HotspotWorker;
use crate::{status_line, ClientCountChanged};

/// Result type alias for daemon operations.
pub type DaemonResult<T> = Result<T, Box<dyn Error>>;

/// Creates the multi-threaded runtime used by every command.
pub fn build_runtime() -> DaemonResult<Runtime> {
    Runtime::new().map_err(|e| {
        Box::new(std::io::Error::other(format!(
            "Failed to create Tokio runtime: {}",
            e
        ))) as Box<dyn Error>
    })
}

/// Builds a worker from `config` and runs `f` with it on a fresh runtime.
///
/// Used by the one-shot CLI queries.
pub fn with_worker<F, Fut, T>(config: &Config, f: F) -> DaemonResult<T>
where
    F: FnOnce(HotspotWorker) -> Fut,
    Fut: Future<Output = T>,
{
    let worker = HotspotWorker::from_config(config)?;
    let runtime = build_runtime()?;
    Ok(runtime.block_on(f(worker)))
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// Falls back to SIGINT only if the SIGTERM handler cannot be registered.
#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("received SIGINT (Ctrl+C), shutting down");
                },
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                },
            }
        }
        Err(e) => {
            warn!(error = %e, "could not register SIGTERM handler, using SIGINT only");
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "failed waiting for SIGINT");
    } else {
        info!("received SIGINT (Ctrl+C), shutting down");
    }
}

/// Prints a status line for every count change until the channel closes.
async fn report_changes(mut rx: tokio::sync::broadcast::Receiver<ClientCountChanged>) {
    loop {
        match rx.recv().await {
            Ok(ClientCountChanged { count }) => println!("{}", status_line(true, Some(count))),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "status reporter lagged behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Runs the monitor in the foreground until a shutdown signal arrives.
///
/// Logging is expected to be initialised by the caller.
pub fn run_monitor(config: &Config) -> DaemonResult<()> {
    let worker = HotspotWorker::from_config(config)?;
    let settings = config.monitor_settings()?;

    info!(
        dialect = ?settings.dialect,
        poll_interval = ?settings.poll_interval,
        command_timeout = ?settings.command_timeout,
        "hotspot monitor starting"
    );

    let runtime = build_runtime()?;
    runtime.block_on(async {
        let reporter = tokio::spawn(report_changes(worker.subscribe()));

        worker.start();
        println!("{}", status_line(worker.is_running(), None));
        info!("monitor running, press Ctrl+C or send SIGTERM to stop");

        wait_for_shutdown().await;

        worker.stop().await;
        reporter.abort();
        println!("{}", status_line(false, None));
    });

    info!("hotspot monitor stopped");
    Ok(())
}
