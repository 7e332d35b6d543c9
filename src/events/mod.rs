//! Event data model and the bounded queue.
//!
//! This module groups the queued unit of work and the buffer it travels
//! through:
//! - [`Envelope`], [`EventPayload`] — type tag + erased payload + per-publish
//!   cancellation;
//! - [`OverflowPolicy`] — the rule applied when the bounded queue is full;
//! - `EventQueue` (crate-internal) — the multi-producer/single-consumer FIFO.
//!
//! ## Quick reference
//! - **Producers**: `Bus::publish` wraps payloads into envelopes and enqueues.
//! - **Consumer**: the dispatcher loop is the only caller of `dequeue()`.

mod envelope;
mod queue;

pub use envelope::{Envelope, EventPayload};
pub use queue::OverflowPolicy;

pub(crate) use queue::{EnqueueError, EventQueue};
