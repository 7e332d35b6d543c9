//! # Event handlers and the resolver boundary.
//!
//! This module provides the handler contracts invoked by the dispatcher and
//! the resolver seam that locates them per event type.
//!
//! ## Architecture
//! ```text
//! Dispatcher ── resolve(type_id) ──► ResolveHandlers (injected)
//!                                         │
//!                                         ▼  e.g. HandlerRegistry
//!                              Vec<Arc<dyn EventHandler>>
//!                                         │
//!                         ┌───────────────┼───────────────┐
//!                         ▼               ▼               ▼
//!                  handler.handle() handler.handle() handler.handle()
//!                      (concurrent fan-out, awaited together)
//! ```
//!
//! ## Contents
//! - [`EventHandler`] — type-erased contract the dispatcher invokes
//! - [`Handle<E>`] — typed contract users implement per payload type
//! - [`ResolveHandlers`] — the injected `resolve(type) -> handlers` capability
//! - [`HandlerRegistry`] — built-in static resolver (type-keyed map)

mod handler;
mod registry;
mod resolve;

pub use handler::{EventHandler, Handle};
pub use registry::HandlerRegistry;
pub use resolve::ResolveHandlers;
