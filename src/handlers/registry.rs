//! # Static handler registry.
//!
//! [`HandlerRegistry`] is the built-in [`ResolveHandlers`] implementation: a
//! type-keyed map built once before the bus starts, then shared immutably
//! with the dispatcher. Registration happens through `&mut self`, so once the
//! registry is wrapped in an `Arc` and handed to
//! [`Bus::start`](crate::Bus::start) the handler set is fixed.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use evbus::{Handle, HandlerError, HandlerRegistry, ResolveHandlers};
//! use tokio_util::sync::CancellationToken;
//!
//! struct UserCreated { id: u64 }
//!
//! struct Welcome;
//!
//! #[async_trait]
//! impl Handle<UserCreated> for Welcome {
//!     async fn handle(&self, ev: &UserCreated, _cancel: &CancellationToken) -> Result<(), HandlerError> {
//!         let _ = ev.id; // send welcome mail...
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = HandlerRegistry::new();
//! registry.on::<UserCreated, _>(Welcome);
//! assert_eq!(registry.subscription_count(), 1);
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::events::EventPayload;

use super::handler::{EventHandler, Handle, Typed};
use super::resolve::ResolveHandlers;

/// Type-keyed registry of handler instances.
///
/// ### Properties
/// - **Fan-out order**: handlers for one type are resolved in registration
///   order, but the dispatcher invokes them concurrently — no completion
///   order is guaranteed.
/// - **Cheap resolve**: one map lookup plus `Arc` clones per event.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TypeId, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed handler for events of type `E`.
    pub fn on<E: EventPayload, H: Handle<E>>(&mut self, handler: H) -> &mut Self {
        self.handlers
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Arc::new(Typed::<E, H>::new(handler)));
        self
    }

    /// Registers an already-erased handler for events of type `E`.
    ///
    /// Useful when one handler instance serves several event types.
    pub fn on_erased<E: EventPayload>(&mut self, handler: Arc<dyn EventHandler>) -> &mut Self {
        self.handlers
            .entry(TypeId::of::<E>())
            .or_default()
            .push(handler);
        self
    }

    /// Number of event types with at least one handler.
    #[must_use]
    pub fn event_type_count(&self) -> usize {
        self.handlers.len()
    }
}

impl ResolveHandlers for HandlerRegistry {
    fn resolve(&self, event_type: TypeId) -> Result<Vec<Arc<dyn EventHandler>>, ResolveError> {
        Ok(self.handlers.get(&event_type).cloned().unwrap_or_default())
    }

    fn subscription_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Ping;
    struct Pong;

    struct Noop;

    #[async_trait]
    impl Handle<Ping> for Noop {
        async fn handle(&self, _ev: &Ping, _cancel: &CancellationToken) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_unknown_type_resolves_empty() {
        let registry = HandlerRegistry::new();
        let set = registry.resolve(TypeId::of::<Pong>()).expect("resolve");
        assert!(set.is_empty());
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = HandlerRegistry::new();
        registry.on::<Ping, _>(Noop).on::<Ping, _>(Noop);

        let set = registry.resolve(TypeId::of::<Ping>()).expect("resolve");
        assert_eq!(set.len(), 2);
        assert_eq!(registry.subscription_count(), 2);
        assert_eq!(registry.event_type_count(), 1);
    }
}
