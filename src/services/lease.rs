//! Scheduler lease
//!
//! A single global configuration setting records the pid of the process
//! allowed to run the scheduler. It is advisory: two processes reading a free
//! lease at the same moment will both take it. Every read-then-write of the
//! lease goes through [`Lease::try_acquire`].

use std::fmt;
use std::sync::Arc;

use super::liveness::LivenessProbe;
use crate::{error::AppResult, repository::SettingsStore};

/// Well-known key of the lease setting
pub const LEASE_KEY: &str = "plugin-controller-pid";

/// Result of a lease acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseOutcome {
    /// The lease was free (absent, stale or unreadable holder) and now records our pid
    Acquired,
    /// The lease already records our pid
    AlreadyHeld,
    /// Another live process holds the lease
    HeldBy(u32),
    /// The lease could not be read, probed or written
    Unavailable(String),
}

impl LeaseOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LeaseOutcome::Acquired | LeaseOutcome::AlreadyHeld)
    }
}

impl fmt::Display for LeaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaseOutcome::Acquired => write!(f, "acquired"),
            LeaseOutcome::AlreadyHeld => write!(f, "already held"),
            LeaseOutcome::HeldBy(pid) => write!(f, "held by live process {}", pid),
            LeaseOutcome::Unavailable(reason) => write!(f, "unavailable ({})", reason),
        }
    }
}

#[derive(Clone)]
pub struct Lease {
    key: String,
    store: Arc<dyn SettingsStore>,
    probe: Arc<dyn LivenessProbe>,
}

impl Lease {
    pub fn new(store: Arc<dyn SettingsStore>, probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            key: LEASE_KEY.to_string(),
            store,
            probe,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pid recorded in the lease, if any and if it is a valid pid
    pub async fn holder(&self) -> AppResult<Option<u32>> {
        let setting = self.store.get_global(&self.key).await?;
        Ok(setting
            .and_then(|s| s.value)
            .and_then(|raw| parse_pid(&raw)))
    }

    /// Whether the recorded holder is a running process
    pub async fn is_held_by_live_process(&self) -> AppResult<bool> {
        let holder = self.holder().await?;
        self.probe.is_running(holder).map_err(|e| {
            crate::error::AppError::Lease(format!("cannot probe holder {:?}: {}", holder, e))
        })
    }

    /// Take the lease for `pid` unless another live process holds it
    pub async fn try_acquire(&self, pid: u32) -> LeaseOutcome {
        let current = match self.store.get_global(&self.key).await {
            Ok(setting) => setting.and_then(|s| s.value),
            Err(e) => return LeaseOutcome::Unavailable(format!("cannot read lease: {}", e)),
        };

        let Some(raw) = current else {
            tracing::debug!("No {} lease recorded, creating it for pid {}", self.key(), pid);
            return self.write(pid).await;
        };

        let Some(holder) = parse_pid(&raw) else {
            tracing::warn!("Lease {} holds invalid pid {:?}, taking it over", self.key(), raw);
            return self.write(pid).await;
        };

        if holder == pid {
            return LeaseOutcome::AlreadyHeld;
        }

        match self.probe.is_running(Some(holder)) {
            Ok(true) => LeaseOutcome::HeldBy(holder),
            Ok(false) => {
                tracing::info!("Holder {} of lease {} is gone, taking over", holder, self.key());
                self.write(pid).await
            }
            Err(e) => LeaseOutcome::Unavailable(format!("cannot probe pid {}: {}", holder, e)),
        }
    }

    async fn write(&self, pid: u32) -> LeaseOutcome {
        match self.store.put_global(&self.key, &pid.to_string()).await {
            Ok(()) => LeaseOutcome::Acquired,
            Err(e) => {
                tracing::error!("Error while saving current pid {} in {}: {}", pid, self.key(), e);
                LeaseOutcome::Unavailable(format!("cannot save lease: {}", e))
            }
        }
    }
}

/// A pid no process can have (outside `pid_t`) is treated like garbage
fn parse_pid(raw: &str) -> Option<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| libc::pid_t::try_from(*pid).is_ok())
}
