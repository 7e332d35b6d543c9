//! Error types used by the evbus runtime and handlers.
//!
//! This module defines the error enums for each boundary of the bus:
//!
//! - [`PublishError`] — admission failures reported synchronously to publishers.
//! - [`ShutdownError`] — failures of the graceful shutdown sequence.
//! - [`HandlerError`] — failures raised by individual handler invocations.
//! - [`ResolveError`] — failures of the handler lookup itself.
//!
//! Admission and shutdown errors are **returned**, never panicked: a full or
//! closed queue is an expected condition, not a fault. Types provide
//! `as_label()` helpers for stable log/metric labels.

use std::time::Duration;
use thiserror::Error;

/// # Errors reported synchronously by `publish`.
///
/// All variants are admission-time failures: by the time dispatch happens the
/// publish call has already returned, so processing-time failures are only
/// observable via logs and the `errors` counter.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The payload was absent; nothing was enqueued and no counter moved.
    #[error("missing payload; event rejected")]
    NullPayload,

    /// The bus is draining or stopped and no longer accepts events.
    #[error("bus is not accepting events")]
    NotAccepting,

    /// The per-publish cancellation token was already cancelled at admission.
    #[error("publish cancelled before admission")]
    Cancelled,

    /// The queue was full under the `DropNewest` overflow policy.
    #[error("queue full; event rejected")]
    QueueFull,

    /// The queue was closed while the event was being admitted.
    #[error("queue closed; event rejected")]
    Closed,
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use evbus::PublishError;
    ///
    /// assert_eq!(PublishError::QueueFull.as_label(), "publish_queue_full");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::NullPayload => "publish_null_payload",
            PublishError::NotAccepting => "publish_not_accepting",
            PublishError::Cancelled => "publish_cancelled",
            PublishError::QueueFull => "publish_queue_full",
            PublishError::Closed => "publish_queue_closed",
        }
    }
}

/// # Errors produced by the shutdown sequence.
///
/// Shutdown always leaves the bus in `Stopped` state; these errors describe
/// what was lost on the way there.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ShutdownError {
    /// The grace period elapsed before the queue drained; remaining queued
    /// items were abandoned and will never be processed.
    #[error("shutdown grace {grace:?} exceeded; {abandoned} queued event(s) abandoned")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of queued events abandoned at the deadline.
        abandoned: usize,
    },

    /// The dispatcher loop had already terminated abnormally (panic escaping
    /// its control logic). The bus stopped processing events at that point.
    #[error("dispatcher loop terminated abnormally")]
    DispatcherPanicked,
}

impl ShutdownError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownError::GraceExceeded { .. } => "shutdown_grace_exceeded",
            ShutdownError::DispatcherPanicked => "shutdown_dispatcher_panicked",
        }
    }
}

/// # Errors produced by individual handler invocations.
///
/// A handler error is caught per-handler by the dispatcher: it is logged with
/// the handler's name and the event type, and does not abort sibling handlers
/// or subsequent events.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Handler execution failed.
    #[error("handler failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// Handler observed cancellation and stopped early.
    #[error("handler cancelled")]
    Cancelled,

    /// The envelope payload was not of the type the handler expects.
    ///
    /// Raised by the typed adapter when a resolver maps an event type to a
    /// handler registered for a different payload.
    #[error("payload type mismatch: expected {expected}, got {actual}")]
    PayloadMismatch {
        /// Payload type the handler was registered for.
        expected: &'static str,
        /// Payload type actually carried by the envelope.
        actual: &'static str,
    },
}

impl HandlerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Failed { .. } => "handler_failed",
            HandlerError::Cancelled => "handler_cancelled",
            HandlerError::PayloadMismatch { .. } => "handler_payload_mismatch",
        }
    }

    /// Convenience constructor from any displayable error.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        HandlerError::Failed {
            error: error.to_string(),
        }
    }
}

/// # Errors produced by the handler lookup itself.
///
/// Caught by the dispatcher, logged, and counted as a processing error for
/// the owning event; the loop continues.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The resolver failed to produce a handler set for the event type.
    #[error("handler resolution failed: {reason}")]
    Failed {
        /// The underlying failure message.
        reason: String,
    },
}

impl ResolveError {
    /// Convenience constructor from any displayable error.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        ResolveError::Failed {
            reason: reason.to_string(),
        }
    }
}
