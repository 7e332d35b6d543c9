//! # Handler contracts
//!
//! Two traits cover the handler seam:
//!
//! - [`EventHandler`] — the type-erased contract the dispatcher invokes. It
//!   receives the raw [`Envelope`] and is what resolvers hand back.
//! - [`Handle<E>`] — the typed contract users implement for one payload type.
//!   The crate-internal [`Typed`] adapter bridges it onto [`EventHandler`] by
//!   downcasting the envelope payload.
//!
//! ## Contract
//! - Handlers may be slow (I/O, batching) — they never block the publisher,
//!   only the dispatch of the **next** event, since the dispatcher awaits the
//!   full fan-out of the current one.
//! - Handlers must not assume same-thread execution as the publisher.
//! - A handler `Err` (or panic) is caught per-handler by the dispatcher and
//!   does not abort sibling handlers for the same event.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use evbus::{Handle, HandlerError};
//! use tokio_util::sync::CancellationToken;
//!
//! struct OrderPlaced { id: u64 }
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Handle<OrderPlaced> for Audit {
//!     async fn handle(&self, ev: &OrderPlaced, _cancel: &CancellationToken) -> Result<(), HandlerError> {
//!         // write audit record...
//!         let _ = ev.id;
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//! }
//! ```

use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::events::{Envelope, EventPayload};

/// Type-erased handler contract, invoked by the dispatcher.
///
/// Called from the dispatcher's fan-out, concurrently with sibling handlers
/// for the same event. Implementations should avoid blocking the async
/// runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle a single event.
    ///
    /// # Parameters
    /// - `event`: the envelope carrying the type-erased payload
    /// - `cancel`: the per-publish cancellation token
    async fn handle(&self, event: &Envelope, cancel: &CancellationToken)
        -> Result<(), HandlerError>;

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Typed handler contract for one payload type.
///
/// Implement this instead of [`EventHandler`] to receive the concrete payload
/// without downcasting by hand; `HandlerRegistry::on` wraps it into the
/// erased form.
#[async_trait]
pub trait Handle<E: EventPayload>: Send + Sync + 'static {
    /// Handle a single event of type `E`.
    async fn handle(&self, event: &E, cancel: &CancellationToken) -> Result<(), HandlerError>;

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapter lifting a typed [`Handle<E>`] onto the erased [`EventHandler`].
pub(crate) struct Typed<E, H> {
    inner: H,
    _marker: PhantomData<fn(E)>,
}

impl<E, H> Typed<E, H> {
    pub(crate) fn new(inner: H) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> EventHandler for Typed<E, H>
where
    E: EventPayload,
    H: Handle<E>,
{
    async fn handle(
        &self,
        event: &Envelope,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        match event.downcast_ref::<E>() {
            Some(payload) => self.inner.handle(payload, cancel).await,
            None => Err(HandlerError::PayloadMismatch {
                expected: std::any::type_name::<E>(),
                actual: event.type_name(),
            }),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Ping(u32);

    #[derive(Default)]
    struct Sum(AtomicU32);

    #[async_trait]
    impl Handle<Ping> for Sum {
        async fn handle(&self, ev: &Ping, _cancel: &CancellationToken) -> Result<(), HandlerError> {
            self.0.fetch_add(ev.0, Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_typed_adapter_downcasts_payload() {
        let adapter = Typed::<Ping, _>::new(Sum::default());
        let env = Envelope::new(Ping(5), CancellationToken::new());
        let cancel = CancellationToken::new();

        adapter.handle(&env, &cancel).await.expect("handled");
        assert_eq!(adapter.inner.0.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_typed_adapter_rejects_wrong_payload() {
        let adapter = Typed::<Ping, _>::new(Sum::default());
        let env = Envelope::new("not a ping", CancellationToken::new());
        let cancel = CancellationToken::new();

        let err = adapter.handle(&env, &cancel).await.expect_err("mismatch");
        assert!(matches!(err, HandlerError::PayloadMismatch { .. }));
    }
}
