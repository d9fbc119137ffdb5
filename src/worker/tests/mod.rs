//! Tests for the hotspot worker, split by concern.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::*;
use crate::channel::testing::{count_calls, ok, stderr, FakeChannel};
use crate::channel::ChannelKind;
use crate::config::schema::CommandsConfig;
use crate::scripts::ShellDialect;

mod reconcile;

/// Self-test issued by the dispatcher for the posix dialect.
const PROBE: &str = "echo ok";

/// Scripted host shared by the fake channels.
///
/// `counts` is consumed front to back; the last entry repeats forever.
#[derive(Clone)]
struct FakeHost {
    status: Arc<Mutex<Result<String, ()>>>,
    counts: Arc<Mutex<VecDeque<Result<String, ()>>>>,
    clients: Arc<Mutex<Result<Vec<String>, String>>>,
    action_error: Arc<Mutex<Option<String>>>,
}

impl FakeHost {
    fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(Ok("Up".to_string()))),
            counts: Arc::new(Mutex::new(VecDeque::from([Ok("0".to_string())]))),
            clients: Arc::new(Mutex::new(Ok(Vec::new()))),
            action_error: Arc::new(Mutex::new(None)),
        }
    }

    fn set_status(&self, status: &str) {
        *self.status.lock().expect("lock") = Ok(status.to_string());
    }

    fn fail_status(&self) {
        *self.status.lock().expect("lock") = Err(());
    }

    fn set_counts(&self, counts: &[&str]) {
        *self.counts.lock().expect("lock") = counts.iter().map(|c| Ok(c.to_string())).collect();
    }

    fn fail_counts(&self) {
        *self.counts.lock().expect("lock") = VecDeque::from([Err(())]);
    }

    fn set_clients(&self, lines: &[&str]) {
        *self.clients.lock().expect("lock") = Ok(lines.iter().map(|l| l.to_string()).collect());
    }

    fn fail_clients(&self, message: &str) {
        *self.clients.lock().expect("lock") = Err(message.to_string());
    }

    /// Makes start and stop run but report `message` on stderr.
    fn fail_actions(&self, message: &str) {
        *self.action_error.lock().expect("lock") = Some(message.to_string());
    }

    fn next_count(&self) -> Result<String, ()> {
        let mut counts = self.counts.lock().expect("lock");
        if counts.len() > 1 {
            counts.pop_front().unwrap_or(Err(()))
        } else {
            counts.front().cloned().unwrap_or(Err(()))
        }
    }

    fn respond(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        match command {
            PROBE => ok(&["ok"]),
            "status" => match self.status.lock().expect("lock").clone() {
                Ok(s) => ok(&[s.as_str()]),
                Err(()) => Err(ChannelError::SessionClosed),
            },
            "count" => match self.next_count() {
                Ok(c) => ok(&[c.as_str()]),
                Err(()) => Err(ChannelError::Timeout(Duration::from_secs(30))),
            },
            "list" => match self.clients.lock().expect("lock").clone() {
                Ok(lines) => Ok(CommandOutput {
                    lines,
                    error: String::new(),
                }),
                Err(message) => stderr(&message),
            },
            "start" | "stop" => match self.action_error.lock().expect("lock").clone() {
                Some(message) => stderr(&message),
                None => ok(&["Success"]),
            },
            other => stderr(&format!("unexpected command: {other}")),
        }
    }
}

/// Worker wired to a [`FakeHost`] through both channels.
struct Harness {
    worker: HotspotWorker,
    host: FakeHost,
    resident_calls: Arc<Mutex<Vec<String>>>,
    process_calls: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new() -> Self {
        let host = FakeHost::new();

        let resident_host = host.clone();
        let resident = FakeChannel::new(ChannelKind::Resident, move |cmd| {
            resident_host.respond(cmd)
        });
        let process_host = host.clone();
        let process = FakeChannel::new(ChannelKind::Process, move |cmd| process_host.respond(cmd));
        let resident_calls = resident.calls();
        let process_calls = process.calls();

        let overrides = CommandsConfig {
            status: "status".to_string(),
            start: "start".to_string(),
            stop: "stop".to_string(),
            list_clients: "list".to_string(),
            count_clients: "count".to_string(),
        };
        let commands = HotspotCommands::from_config(ShellDialect::Posix, &overrides);
        let dispatcher =
            ChannelDispatcher::new(Arc::new(resident), Arc::new(process), ShellDialect::Posix);

        Self {
            worker: HotspotWorker::new(dispatcher, commands, WorkerSettings::default()),
            host,
            resident_calls,
            process_calls,
        }
    }

    /// Calls of `command` across both channels.
    fn calls(&self, command: &str) -> usize {
        count_calls(&self.resident_calls, command) + count_calls(&self.process_calls, command)
    }
}

/// Drains every notification currently queued on `rx`.
fn drain(rx: &mut broadcast::Receiver<ClientCountChanged>) -> Vec<i32> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event.count);
    }
    seen
}
