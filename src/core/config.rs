//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings fixed at [`Bus::start`](super::Bus::start):
//! queue capacity, overflow policy, and the shutdown grace period.
//!
//! ## Field semantics
//! - `capacity`: bounded queue size (min 1; clamped by the queue)
//! - `overflow`: rule applied when the queue is full — exactly one policy per
//!   bus instance, never silently mixed
//! - `grace`: maximum wait for the dispatcher to drain on shutdown
//!   (`Duration::ZERO` = return immediately, abandon whatever is queued)

use std::time::Duration;

use crate::events::OverflowPolicy;

/// Configuration for one bus instance.
///
/// All fields are public for flexibility; prefer the accessors where a
/// clamped value is needed.
#[derive(Clone, Copy, Debug)]
pub struct BusConfig {
    /// Capacity of the bounded event queue.
    ///
    /// Minimum value is 1 (enforced by the queue).
    pub capacity: usize,

    /// Behavior of `publish` when the queue is full.
    ///
    /// Only [`OverflowPolicy::Block`] ever suspends the publishing task.
    pub overflow: OverflowPolicy,

    /// Maximum time `shutdown` waits for queued events to drain.
    ///
    /// On expiry, remaining queued items are abandoned (never processed) and
    /// the bus transitions to `Stopped` regardless.
    pub grace: Duration,
}

impl BusConfig {
    /// Returns the queue capacity clamped to a minimum of 1.
    #[inline]
    #[must_use]
    pub fn capacity_clamped(&self) -> usize {
        self.capacity.max(1)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `capacity = 1024` (good baseline)
    /// - `overflow = Block` (backpressure over loss)
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            capacity: 1024,
            overflow: OverflowPolicy::Block,
            grace: Duration::from_secs(5),
        }
    }
}
