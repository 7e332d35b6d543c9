//! # Event envelope: the queued unit of work.
//!
//! An [`Envelope`] combines a runtime type tag, the type-erased payload, and
//! the per-publish cancellation token. It is created by `publish`, placed into
//! the bounded queue, and consumed exactly once by the dispatcher (or dropped
//! by the queue's overflow policy — never both).
//!
//! ## Ordering guarantees
//! Each envelope carries a globally unique sequence number (`seq`) assigned at
//! admission. Admission order is preserved in dispatch order (FIFO), so `seq`
//! also reflects dispatch order for events that reach the dispatcher.
//!
//! ## Example
//! ```rust
//! use evbus::Envelope;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, PartialEq)]
//! struct OrderPlaced { id: u64 }
//!
//! let env = Envelope::new(OrderPlaced { id: 7 }, CancellationToken::new());
//! assert_eq!(env.downcast_ref::<OrderPlaced>(), Some(&OrderPlaced { id: 7 }));
//! assert!(env.type_name().contains("OrderPlaced"));
//! ```

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

/// Global sequence counter for envelope admission ordering.
static ENVELOPE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Marker bound for publishable event payloads.
///
/// Blanket-implemented for every `'static` type that is `Send + Sync`; users
/// never implement it by hand.
pub trait EventPayload: Any + Send + Sync {}

impl<T: Any + Send + Sync> EventPayload for T {}

/// The queued unit combining event type, payload, and per-publish cancellation.
///
/// ### Properties
/// - **Immutable**: fields are fixed at admission; accessors only.
/// - **Cheap to move**: the payload is behind an `Arc`.
/// - **Consumed once**: dequeued by the single dispatcher or evicted by the
///   overflow policy, never processed twice.
#[derive(Clone)]
pub struct Envelope {
    /// Globally unique, monotonically increasing admission sequence.
    seq: u64,
    /// Wall-clock admission timestamp.
    at: SystemTime,
    /// Runtime type tag used for handler resolution.
    type_id: TypeId,
    /// Human-readable payload type name (for logs).
    type_name: &'static str,
    /// Type-erased payload.
    payload: Arc<dyn Any + Send + Sync>,
    /// Per-publish cancellation token, honored at admission and at dispatch.
    cancel: CancellationToken,
}

impl Envelope {
    /// Wraps a typed payload with the next admission sequence and the current
    /// wall-clock timestamp.
    pub fn new<E: EventPayload>(payload: E, cancel: CancellationToken) -> Self {
        Self {
            seq: ENVELOPE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            payload: Arc::new(payload),
            cancel,
        }
    }

    /// Admission sequence number.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wall-clock admission timestamp.
    #[inline]
    pub fn at(&self) -> SystemTime {
        self.at
    }

    /// Runtime type tag of the payload; the key handlers are resolved by.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Payload type name for logs and error messages.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Per-publish cancellation token.
    #[inline]
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Borrows the payload as a concrete type, if it matches.
    #[inline]
    pub fn downcast_ref<E: EventPayload>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("seq", &self.seq)
            .field("type_name", &self.type_name)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Ping(u32);

    #[test]
    fn test_seq_is_monotonic() {
        let a = Envelope::new(Ping(1), CancellationToken::new());
        let b = Envelope::new(Ping(2), CancellationToken::new());
        assert!(b.seq() > a.seq());
    }

    #[test]
    fn test_downcast_matches_payload_type() {
        let env = Envelope::new(Ping(42), CancellationToken::new());
        assert_eq!(env.type_id(), TypeId::of::<Ping>());
        assert_eq!(env.downcast_ref::<Ping>(), Some(&Ping(42)));
        assert!(env.downcast_ref::<String>().is_none());
    }
}
