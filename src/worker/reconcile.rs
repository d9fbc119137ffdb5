//! Reconciliation loop.
//!
//! `Probe -> (Healthy | Reactivate) -> UpdateClientCount -> Sleep`, repeated
//! until cancelled. Cancellation is checked at the top of each iteration and
//! awaited during the sleep; it never interrupts a command in flight.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::WorkerInner;
use crate::scripts::CommandRole;
use crate::ClientCountChanged;

pub(super) async fn run_loop(inner: Arc<WorkerInner>, token: CancellationToken) {
    while !token.is_cancelled() {
        inner.reconcile_once().await;

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(inner.settings.poll_interval) => {}
        }
    }
    debug!("reconciliation loop exited");
}

impl WorkerInner {
    /// One pass of the loop body.
    pub(super) async fn reconcile_once(&self) {
        info!(
            time = %Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            "worker running"
        );

        let healthy = self.check_status().await;
        info!(healthy, "hotspot status");
        if !healthy {
            warn!("hotspot inactive, attempting to reactivate");
            self.reactivate().await;
        }

        self.update_client_count().await;
    }

    async fn reactivate(&self) {
        match self.run_role(CommandRole::Start).await {
            Ok(output) if output.had_errors() => {
                error!(error = %output.error, "failed to reactivate hotspot")
            }
            Ok(output) if !output.lines.is_empty() => {
                info!(output = %output.text(), "hotspot reactivation attempt")
            }
            Ok(_) => info!("hotspot reactivation attempt"),
            Err(e) => error!(error = %e, "failed to reactivate hotspot"),
        }
    }

    /// Stores the freshly observed count and notifies subscribers when it
    /// differs from the previous one.
    async fn update_client_count(&self) {
        let count = self.query_count().await;
        let previous = self.last_count.swap(count, Ordering::SeqCst);
        if previous != count {
            info!(previous, count, "client count changed");
            let _ = self.update_tx.send(ClientCountChanged { count });
        }
    }
}
