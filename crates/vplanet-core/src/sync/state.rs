//! Engine state
//!
//! The bookkeeping half of the sync engine: listener registry, watermark,
//! reconnect accounting, push/poll status. Kept free of IO so the state
//! transitions can be tested without a server.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::change::ChangeEvent;

/// Subscriber callback. Identity is the `Arc` pointer, so registering the
/// same `Arc` twice is a no-op while two closures with identical code are
/// distinct listeners.
pub type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync + 'static>;

/// Push channel status as the engine sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    /// No connection and none in progress
    Absent,
    /// Connection attempt in flight
    Connecting,
    /// Channel confirmed open
    Open,
}

/// Polling cadence. Fast while push is degraded, slow once push is the
/// primary transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCadence {
    Fast,
    Slow,
}

/// Mutable engine state, guarded by the service's single lock
pub(crate) struct EngineState {
    listeners: Vec<Listener>,
    last_observed: Option<DateTime<Utc>>,
    reconnect_attempts: u32,
    push: PushStatus,
    cadence: PollCadence,
    /// Bumped on every teardown; tasks spawned under an older epoch treat
    /// themselves as stale and do nothing.
    epoch: u64,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            last_observed: None,
            reconnect_attempts: 0,
            push: PushStatus::Absent,
            cadence: PollCadence::Fast,
            epoch: 0,
        }
    }

    /// Register a listener. Returns false if this exact callback is
    /// already registered.
    pub fn add_listener(&mut self, listener: Listener) -> bool {
        if self.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Remove a listener. Returns true if it was registered.
    pub fn remove_listener(&mut self, listener: &Listener) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        self.listeners.len() != before
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Snapshot for fan-out outside the lock, so a listener can call back
    /// into the engine without deadlocking.
    pub fn listeners_snapshot(&self) -> Vec<Listener> {
        self.listeners.clone()
    }

    /// Advance the watermark. Never moves backwards.
    pub fn observe(&mut self, ts: DateTime<Utc>) {
        match self.last_observed {
            Some(current) if current >= ts => {}
            _ => self.last_observed = Some(ts),
        }
    }

    pub fn last_observed(&self) -> Option<DateTime<Utc>> {
        self.last_observed
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    pub fn push(&self) -> PushStatus {
        self.push
    }

    pub fn set_push(&mut self, status: PushStatus) {
        self.push = status;
    }

    pub fn cadence(&self) -> PollCadence {
        self.cadence
    }

    pub fn set_cadence(&mut self, cadence: PollCadence) {
        self.cadence = cadence;
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Reset backoff accounting (on successful open, or on re-activation)
    pub fn reset_reconnect(&mut self) {
        self.reconnect_attempts = 0;
    }

    /// Account for one more reconnect attempt and compute its delay.
    /// Returns None once the attempt budget is spent.
    pub fn next_reconnect_delay(
        &mut self,
        base: Duration,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Option<Duration> {
        if self.reconnect_attempts >= max_attempts {
            return None;
        }
        self.reconnect_attempts += 1;
        let exponent = self.reconnect_attempts.saturating_sub(1).min(16);
        let delay = base.saturating_mul(1 << exponent);
        Some(delay.min(max_delay))
    }
}

/// Deliver one change to every listener exactly once. A panicking listener
/// is logged and skipped; it never interrupts delivery to the rest.
pub(crate) fn fan_out(listeners: &[Listener], change: &ChangeEvent) {
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| listener(change))).is_err() {
            warn!("Change listener panicked; continuing with remaining listeners");
        }
    }
}
