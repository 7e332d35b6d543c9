//! # Handler resolver boundary.
//!
//! [`ResolveHandlers`] is the seam between the dispatch engine and whatever
//! mechanism locates and constructs handlers. The core never discovers
//! handlers itself: the dispatcher depends only on this capability, injected
//! at [`Bus::start`](crate::Bus::start).
//!
//! ## Rules
//! - An **unknown event type is not an error**: return an empty vec; the
//!   dispatcher treats it as a no-op successful dispatch.
//! - A resolver failure (`Err`) is caught by the dispatcher, logged, and
//!   counted as a processing error for the owning event; the loop continues.
//! - Resolution happens once per event; the returned handler set does not
//!   outlive that single dispatch.

use std::any::TypeId;
use std::sync::Arc;

use crate::error::ResolveError;

use super::handler::EventHandler;

/// Capability mapping an event type to its registered handler instances.
pub trait ResolveHandlers: Send + Sync + 'static {
    /// Returns the (possibly empty) handler set for the given event type.
    fn resolve(&self, event_type: TypeId) -> Result<Vec<Arc<dyn EventHandler>>, ResolveError>;

    /// Total number of live handler registrations, for the statistics
    /// snapshot. Best-effort: resolvers that cannot report one return 0.
    fn subscription_count(&self) -> usize {
        0
    }
}
