//! Runtime core: dispatch engine and lifecycle.
//!
//! This module contains the embedded implementation of the bus runtime. The
//! public API from this module is [`Bus`], [`BusConfig`], and [`BusState`];
//! the dispatcher itself stays internal.
//!
//! Internal modules:
//! - [`bus`]: publish surface and lifecycle controller;
//! - [`dispatcher`]: the single-consumer processing loop and handler fan-out;
//! - [`config`]: per-instance configuration;
//! - [`state`]: forward-only lifecycle state.

mod bus;
mod config;
mod dispatcher;
mod state;

pub use bus::Bus;
pub use config::BusConfig;
pub use state::BusState;
