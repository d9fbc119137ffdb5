//! Scripted in-memory channel for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{ChannelError, ChannelKind, CommandChannel, CommandOutput};

type Handler = dyn Fn(&str) -> Result<CommandOutput, ChannelError> + Send + Sync;

/// Channel whose responses come from a closure. Every command it receives is
/// recorded in order.
pub(crate) struct FakeChannel {
    kind: ChannelKind,
    handler: Box<Handler>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl FakeChannel {
    pub(crate) fn new<F>(kind: ChannelKind, handler: F) -> Self
    where
        F: Fn(&str) -> Result<CommandOutput, ChannelError> + Send + Sync + 'static,
    {
        Self {
            kind,
            handler: Box::new(handler),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleeps for `delay` before answering each call.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared handle to the recorded calls.
    pub(crate) fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CommandChannel for FakeChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(command.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(command)
    }
}

/// Output with the given stdout lines and no error text.
pub(crate) fn ok(lines: &[&str]) -> Result<CommandOutput, ChannelError> {
    Ok(CommandOutput {
        lines: lines.iter().map(|l| l.to_string()).collect(),
        error: String::new(),
    })
}

/// Output with no lines and the given error text.
pub(crate) fn stderr(text: &str) -> Result<CommandOutput, ChannelError> {
    Ok(CommandOutput {
        lines: Vec::new(),
        error: text.to_string(),
    })
}

/// Number of recorded calls equal to `command`.
pub(crate) fn count_calls(calls: &Arc<Mutex<Vec<String>>>, command: &str) -> usize {
    calls
        .lock()
        .expect("calls lock poisoned")
        .iter()
        .filter(|c| c.as_str() == command)
        .count()
}
