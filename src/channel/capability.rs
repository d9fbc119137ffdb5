//! Capability cache for the resident channel.
//!
//! Records, per [`CapabilityClass`], whether the resident channel can serve
//! that class of command. All state sits behind one async mutex and is only
//! reachable through [`CapabilityCache::get_or_detect`] and
//! [`CapabilityCache::demote`], which keeps concurrent detection single-shot
//! and the fallback warning logged at most once per class.
//!
//! Knowledge is in-memory only and resets when the process restarts.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Class of command the resident channel may or may not be able to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityClass {
    /// Plain shell commands (adapter status).
    Basic,
    /// Commands that need the platform tethering runtime.
    Tethering,
}

impl fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityClass::Basic => write!(f, "basic"),
            CapabilityClass::Tethering => write!(f, "tethering"),
        }
    }
}

/// Whether the resident channel can serve a capability class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelCapability {
    /// Not probed yet.
    #[default]
    Unknown,
    /// The resident channel serves this class.
    Available,
    /// The resident channel cannot serve this class; use the process channel.
    Unavailable,
}

#[derive(Debug, Default)]
struct Entry {
    capability: ChannelCapability,
    fallback_logged: bool,
}

impl Entry {
    /// Marks the class unavailable. Returns `true` the first time a fallback
    /// is recorded for this class.
    fn mark_unavailable(&mut self) -> bool {
        self.capability = ChannelCapability::Unavailable;
        !std::mem::replace(&mut self.fallback_logged, true)
    }
}

/// Process-wide memo of resident channel capabilities.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: Mutex<HashMap<CapabilityClass, Entry>>,
}

impl CapabilityCache {
    /// Creates an empty cache where every class is [`ChannelCapability::Unknown`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the capability for `class`, running `detect` first if the
    /// class has never been decided.
    ///
    /// `detect` yields `Some(true)` or `Some(false)` for a conclusive answer
    /// and `None` when the self-test could not decide (it timed out). An
    /// undecided self-test leaves the class [`ChannelCapability::Unknown`], so
    /// the next caller runs the self-test again.
    ///
    /// The lock is held while `detect` runs, so concurrent callers wait for
    /// the single probe instead of starting their own.
    pub async fn get_or_detect<F, Fut>(&self, class: CapabilityClass, detect: F) -> ChannelCapability
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<bool>>,
    {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(class).or_default();
        if entry.capability == ChannelCapability::Unknown {
            debug!(%class, "probing resident channel capability");
            match detect().await {
                Some(true) => {
                    entry.capability = ChannelCapability::Available;
                    debug!(%class, "resident channel capability available");
                }
                Some(false) => {
                    if entry.mark_unavailable() {
                        warn!(
                            %class,
                            "resident channel lacks capability, falling back to process channel"
                        );
                    }
                }
                None => debug!(%class, "resident channel self-test undecided"),
            }
        }
        entry.capability
    }

    /// Demotes `class` to [`ChannelCapability::Unavailable`] after a resident
    /// failure.
    ///
    /// Returns `true` if this call logged the fallback warning, which happens
    /// only once per class for the lifetime of the cache.
    pub async fn demote(&self, class: CapabilityClass, reason: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let logged = entries.entry(class).or_default().mark_unavailable();
        if logged {
            warn!(
                %class,
                reason,
                "resident channel lacks capability, falling back to process channel"
            );
        }
        logged
    }

    /// Current capability for `class` without probing.
    pub async fn peek(&self, class: CapabilityClass) -> ChannelCapability {
        self.entries
            .lock()
            .await
            .get(&class)
            .map(|e| e.capability)
            .unwrap_or_default()
    }
}
