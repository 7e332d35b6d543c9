//! # evbus
//!
//! **evbus** is an in-process publish/subscribe event bus for Rust.
//!
//! Producers hand typed event payloads to a [`Bus`]; a bounded queue decouples
//! them from a single background dispatcher that fans each event out to all
//! handlers registered for its type, isolating handler failures and recording
//! processing metrics.
//!
//! ## Architecture
//! ```text
//!   Producers (many):                          Consumer (one):
//!     task A ──┐
//!     task B ──┼── publish() ──► EventQueue ──► Dispatcher loop
//!     task C ──┘                 (bounded         │
//!                                 FIFO,           ├─► ResolveHandlers
//!                                 overflow        │     (type_id → handlers)
//!                                 policy)         │
//!                                                 ├─► concurrent fan-out:
//!                                                 │     handler 1 ─┐
//!                                                 │     handler 2 ─┼─ awaited
//!                                                 │     handler N ─┘  together
//!                                                 │
//!                                                 └─► BusMetrics
//!                                                       (published/processed/
//!                                                        errors + snapshot)
//! ```
//!
//! ## Guarantees
//! - **FIFO dispatch**: admission order into the queue is preserved in
//!   dispatch order. Dispatch is sequential across events and parallel only
//!   within one event's handler set.
//! - **Failure isolation**: one handler failing (error or panic) never
//!   prevents its siblings from running, nor stops subsequent events.
//! - **Backpressure or loss, explicitly**: a full queue blocks the producer,
//!   rejects the newest item, or evicts the oldest — per the configured
//!   [`OverflowPolicy`], never silently mixed.
//! - **Bounded shutdown**: [`Bus::shutdown`] drains queued events for at most
//!   the configured grace period, then abandons the rest and reports it.
//!
//! ## Features
//! | Area           | Description                                              | Key types / traits                   |
//! |----------------|----------------------------------------------------------|--------------------------------------|
//! | **Publishing** | Typed publish with structured admission outcomes.        | [`Bus`], [`PublishError`]            |
//! | **Handlers**   | Async per-type handlers with concurrent fan-out.         | [`Handle`], [`EventHandler`]         |
//! | **Resolution** | Injected `resolve(type) -> handlers` capability.         | [`ResolveHandlers`], [`HandlerRegistry`] |
//! | **Queueing**   | Bounded FIFO with explicit overflow policy.              | [`OverflowPolicy`], [`BusConfig`]    |
//! | **Metrics**    | Monotonic counters plus on-demand snapshot.              | [`BusStats`]                         |
//! | **Lifecycle**  | Running → Draining → Stopped with bounded grace.         | [`BusState`], [`ShutdownError`]      |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use evbus::{Bus, BusConfig, Handle, HandlerError, HandlerRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! struct UserCreated { name: String }
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Handle<UserCreated> for Greeter {
//!     async fn handle(&self, ev: &UserCreated, _cancel: &CancellationToken) -> Result<(), HandlerError> {
//!         println!("hello, {}!", ev.name);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = HandlerRegistry::new();
//!     registry.on::<UserCreated, _>(Greeter);
//!
//!     let bus = Bus::start(BusConfig::default(), Arc::new(registry));
//!     bus.publish(UserCreated { name: "ada".into() }).await?;
//!
//!     bus.shutdown().await?;
//!     let stats = bus.stats();
//!     assert_eq!(stats.published, 1);
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod handlers;
mod metrics;

// ---- Public re-exports ----

pub use core::{Bus, BusConfig, BusState};
pub use error::{HandlerError, PublishError, ResolveError, ShutdownError};
pub use events::{Envelope, EventPayload, OverflowPolicy};
pub use handlers::{EventHandler, Handle, HandlerRegistry, ResolveHandlers};
pub use metrics::BusStats;
