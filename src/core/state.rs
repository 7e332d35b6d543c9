//! # Bus lifecycle state.
//!
//! [`BusState`] is owned by the lifecycle controller and only ever moves
//! forward: `Running → Draining → Stopped`, no re-entry. The crate-internal
//! [`StateCell`] stores it in an atomic so producer threads can check
//! admission without locking.

use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};

/// Lifecycle state of the bus.
///
/// Transitions are forward-only; a stopped bus is never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BusState {
    /// Accepting publishes; dispatcher running.
    Running = 0,
    /// Queue closed to new enqueues; dispatcher draining queued items.
    Draining = 1,
    /// Dispatcher finished or abandoned; the bus is permanently inert.
    Stopped = 2,
}

impl BusState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => BusState::Running,
            1 => BusState::Draining,
            _ => BusState::Stopped,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusState::Running => "running",
            BusState::Draining => "draining",
            BusState::Stopped => "stopped",
        }
    }
}

/// Atomic holder enforcing forward-only transitions.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(BusState::Running as u8))
    }

    pub(crate) fn load(&self) -> BusState {
        BusState::from_u8(self.0.load(AtomicOrdering::Acquire))
    }

    /// Advances to `target` if it is strictly ahead of the current state.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// state had already reached (or passed) `target`.
    pub(crate) fn advance(&self, target: BusState) -> bool {
        let mut current = self.0.load(AtomicOrdering::Acquire);
        loop {
            if BusState::from_u8(current) >= target {
                return false;
            }
            match self.0.compare_exchange(
                current,
                target as u8,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
