//! # Processing metrics and the statistics snapshot.
//!
//! [`BusMetrics`] holds three independent monotonic counters (published,
//! processed, errors) plus the timestamp of the last dispatched event. Each
//! increment also forwards to the [`metrics`] crate facade, so an installed
//! exporter (e.g. Prometheus) observes the same totals:
//!
//! - `evbus_events_published_total`
//! - `evbus_events_processed_total`
//! - `evbus_events_failed_total`
//!
//! ## Rules
//! - Counters are **independent atomics**: [`BusStats`] is composed from
//!   separate reads and is eventually consistent, not a transactional
//!   snapshot. No read ever observes a counter moving backward.
//! - `published` is bumped by producer threads; `processed`/`errors` by the
//!   single dispatcher (plus `errors` for admission failures).
//! - Invariant at quiescence: `processed + errors <= published`.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::counter;

/// Point-in-time view of the bus counters.
///
/// Computed on demand from independent atomic reads; see the module docs for
/// the consistency model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Total events admitted by `publish` (including ones later dropped by
    /// the overflow policy).
    pub published: u64,
    /// Total events whose full handler fan-out completed without failure.
    pub processed: u64,
    /// Total events that errored: at least one handler failed, resolution
    /// failed, or admission failed after the `published` increment.
    pub errors: u64,
    /// Live handler registrations as reported by the resolver (best-effort;
    /// 0 when the resolver cannot report one).
    pub active_subscriptions: usize,
    /// Wall-clock time of the last dispatched event, if any.
    pub last_event_at: Option<SystemTime>,
}

/// Thread-safe monotonic counters for the bus.
pub(crate) struct BusMetrics {
    published: AtomicU64,
    processed: AtomicU64,
    errors: AtomicU64,
    /// Unix milliseconds of the last dispatch outcome; 0 = none yet.
    last_event_ms: AtomicU64,
}

impl BusMetrics {
    pub(crate) fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_event_ms: AtomicU64::new(0),
        }
    }

    /// One event admitted by `publish`.
    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, AtomicOrdering::Relaxed);
        counter!("evbus_events_published_total").increment(1);
    }

    /// One event whose full fan-out completed without failure.
    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, AtomicOrdering::Relaxed);
        counter!("evbus_events_processed_total").increment(1);
        self.touch();
    }

    /// One event that errored during dispatch (handler or resolution failure).
    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, AtomicOrdering::Relaxed);
        counter!("evbus_events_failed_total").increment(1);
        self.touch();
    }

    /// One event that errored at admission, after the `published` increment
    /// (queue closed, or full under `DropNewest`). Does not stamp
    /// `last_event_at`: the event never reached the dispatcher.
    pub(crate) fn record_admission_failure(&self) {
        self.errors.fetch_add(1, AtomicOrdering::Relaxed);
        counter!("evbus_events_failed_total").increment(1);
    }

    /// Composes a snapshot from the current counter values.
    pub(crate) fn snapshot(&self, active_subscriptions: usize) -> BusStats {
        let ms = self.last_event_ms.load(AtomicOrdering::Relaxed);
        BusStats {
            published: self.published.load(AtomicOrdering::Relaxed),
            processed: self.processed.load(AtomicOrdering::Relaxed),
            errors: self.errors.load(AtomicOrdering::Relaxed),
            active_subscriptions,
            last_event_at: (ms > 0).then(|| UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }

    fn touch(&self) {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0);
        self.last_event_ms.store(ms, AtomicOrdering::Relaxed);
    }
}
