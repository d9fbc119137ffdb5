//! Per-call channel selection.
//!
//! For a command of a given [`CapabilityClass`]:
//!
//! 1. Unknown capability: run the class self-test on the resident channel
//!    and record the result. A self-test that times out decides nothing and
//!    this one call goes to the process channel.
//! 2. Available: run on the resident channel. If the resident channel fails
//!    (other than by timeout) or its error output shows it cannot run the
//!    command, demote the class and retry once on the process channel.
//! 3. Unavailable: run on the process channel.
//!
//! Any other error output means the command ran and failed. It is returned
//! to the caller as-is and not retried. A timeout is returned as-is too: it
//! does not demote the class and is not retried.

use std::sync::Arc;

use tracing::debug;

use super::{
    CapabilityCache, CapabilityClass, ChannelCapability, ChannelError, CommandChannel,
    CommandOutput,
};
use crate::scripts::{self, ShellDialect, SELF_TEST_TOKEN};

/// Routes commands to the resident or process channel.
pub struct ChannelDispatcher {
    resident: Arc<dyn CommandChannel>,
    process: Arc<dyn CommandChannel>,
    cache: CapabilityCache,
    dialect: ShellDialect,
}

impl ChannelDispatcher {
    /// Creates a dispatcher with an empty capability cache.
    pub fn new(
        resident: Arc<dyn CommandChannel>,
        process: Arc<dyn CommandChannel>,
        dialect: ShellDialect,
    ) -> Self {
        Self {
            resident,
            process,
            cache: CapabilityCache::new(),
            dialect,
        }
    }

    /// Capability cache shared by every call through this dispatcher.
    pub fn cache(&self) -> &CapabilityCache {
        &self.cache
    }

    /// Runs `command`, choosing a channel for `class`.
    pub async fn run(
        &self,
        class: CapabilityClass,
        command: &str,
    ) -> Result<CommandOutput, ChannelError> {
        let capability = self
            .cache
            .get_or_detect(class, || self.self_test(class))
            .await;

        match capability {
            ChannelCapability::Available => {}
            ChannelCapability::Unavailable => return self.process.execute(command).await,
            ChannelCapability::Unknown => {
                debug!(%class, "capability undecided, using process channel for this call");
                return self.process.execute(command).await;
            }
        }

        match self.resident.execute(command).await {
            Ok(output) if lacks_capability(&output.error) => {
                self.fall_back(class, &output.error, command).await
            }
            Ok(output) => Ok(output),
            Err(e) if e.is_timeout() => Err(e),
            Err(e) => self.fall_back(class, &e.to_string(), command).await,
        }
    }

    async fn fall_back(
        &self,
        class: CapabilityClass,
        reason: &str,
        command: &str,
    ) -> Result<CommandOutput, ChannelError> {
        self.cache.demote(class, reason).await;
        debug!(%class, reason, "retrying on process channel");
        self.process.execute(command).await
    }

    /// `None` when the self-test timed out and proved nothing either way.
    async fn self_test(&self, class: CapabilityClass) -> Option<bool> {
        let probe = scripts::self_test(self.dialect, class);
        match self.resident.execute(probe).await {
            Ok(output) => Some(
                !output.had_errors()
                    && output
                        .lines
                        .first()
                        .is_some_and(|l| l.trim() == SELF_TEST_TOKEN),
            ),
            Err(e) if e.is_timeout() => {
                debug!(%class, error = %e, "resident self-test timed out");
                None
            }
            Err(e) => {
                debug!(%class, error = %e, "resident self-test failed");
                Some(false)
            }
        }
    }
}

/// Error output that means the interpreter could not resolve part of the
/// command, as opposed to the command running and failing.
const MISSING_CAPABILITY_MARKERS: &[&str] = &[
    "Unable to find type",
    "TypeNotFound",
    "is not recognized as",
    "command not found",
    ": not found",
];

fn lacks_capability(error: &str) -> bool {
    MISSING_CAPABILITY_MARKERS
        .iter()
        .any(|marker| error.contains(marker))
}
