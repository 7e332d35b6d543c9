//! # Bus: publish surface and lifecycle controller.
//!
//! [`Bus`] owns the bounded queue, the metrics recorder, and the dispatcher
//! task. It is created running ([`Bus::start`]) and torn down exactly once
//! ([`Bus::shutdown`]) with a bounded grace period.
//!
//! ## Architecture
//! ```text
//! Producers (many):                             Consumer (one):
//!   task A ──┐
//!   task B ──┼── publish() ──► EventQueue ──► Dispatcher loop
//!   task C ──┘   (admission      (bounded        │
//!                 checks +        FIFO)          ├─► resolve(type_id)
//!                 counters)                      ├─► handler fan-out
//!                                                └─► BusMetrics
//! Shutdown path:
//!   shutdown() ─► state → Draining ─► queue.close()
//!              ─► wait up to grace for the dispatcher to drain
//!                    ├─ drained      → Ok, state → Stopped
//!                    └─ grace expired → force-stop token, abandon queue,
//!                                       Err(GraceExceeded), state → Stopped
//! ```
//!
//! ## Rules
//! - `publish` after `shutdown` begins fails fast with
//!   [`PublishError::NotAccepting`]; it never blocks indefinitely.
//! - Processing-time failures never propagate to publishers: they surface
//!   only through logs and the `errors` counter.
//! - Share the bus between producers by wrapping it in an `Arc`.
//!
//! ## Example
//! ```no_run
//! use async_trait::async_trait;
//! use evbus::{Bus, BusConfig, Handle, HandlerError, HandlerRegistry};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! struct OrderPlaced { id: u64 }
//!
//! struct Fulfillment;
//!
//! #[async_trait]
//! impl Handle<OrderPlaced> for Fulfillment {
//!     async fn handle(&self, ev: &OrderPlaced, _cancel: &CancellationToken) -> Result<(), HandlerError> {
//!         println!("fulfilling order {}", ev.id);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = HandlerRegistry::new();
//!     registry.on::<OrderPlaced, _>(Fulfillment);
//!
//!     let bus = Bus::start(BusConfig::default(), Arc::new(registry));
//!     bus.publish(OrderPlaced { id: 42 }).await?;
//!
//!     bus.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{PublishError, ShutdownError};
use crate::events::{EnqueueError, Envelope, EventPayload, EventQueue};
use crate::handlers::ResolveHandlers;
use crate::metrics::{BusMetrics, BusStats};

use super::config::BusConfig;
use super::dispatcher::Dispatcher;
use super::state::{BusState, StateCell};

/// In-process publish/subscribe event bus.
///
/// Producers hand typed payloads to [`Bus::publish`]; the background
/// dispatcher fans each one out to all handlers resolved for its type,
/// isolating handler failures and recording outcomes in [`BusStats`].
pub struct Bus {
    cfg: BusConfig,
    queue: Arc<EventQueue>,
    metrics: Arc<BusMetrics>,
    resolver: Arc<dyn ResolveHandlers>,
    state: StateCell,
    /// Force-stop signal handed to the dispatcher; cancelled when the
    /// shutdown grace period expires.
    stop: CancellationToken,
    /// Dispatcher task handle; taken exactly once by `shutdown`.
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Bus {
    /// Builds the queue, spawns the dispatcher loop, and returns the bus in
    /// `Running` state.
    ///
    /// The resolver is fixed for the bus's lifetime; build and register all
    /// handlers before calling this.
    #[must_use]
    pub fn start(cfg: BusConfig, resolver: Arc<dyn ResolveHandlers>) -> Self {
        let queue = Arc::new(EventQueue::new(cfg.capacity_clamped(), cfg.overflow));
        let metrics = Arc::new(BusMetrics::new());
        let stop = CancellationToken::new();

        let dispatcher = Dispatcher::new(
            Arc::clone(&queue),
            Arc::clone(&resolver),
            Arc::clone(&metrics),
            stop.clone(),
        );
        let handle = tokio::spawn(dispatcher.run());

        info!(
            capacity = cfg.capacity_clamped(),
            overflow = cfg.overflow.as_label(),
            "bus started"
        );

        Self {
            cfg,
            queue,
            metrics,
            resolver,
            state: StateCell::new(),
            stop,
            dispatcher: Mutex::new(Some(handle)),
        }
    }

    /// Publishes one event with a fresh (never-cancelled) token.
    ///
    /// See [`Bus::publish_with`] for the admission contract.
    pub async fn publish<E: EventPayload>(&self, event: E) -> Result<(), PublishError> {
        self.publish_with(event, CancellationToken::new()).await
    }

    /// Publishes one event carrying a per-publish cancellation token.
    ///
    /// The token is honored twice: at admission (already cancelled →
    /// [`PublishError::Cancelled`], nothing counted) and at dispatch (the
    /// event is skipped silently, counting as neither processed nor error).
    ///
    /// Suspends only under [`OverflowPolicy::Block`](crate::OverflowPolicy::Block)
    /// on a full queue.
    pub async fn publish_with<E: EventPayload>(
        &self,
        event: E,
        cancel: CancellationToken,
    ) -> Result<(), PublishError> {
        self.publish_opt(Some(event), cancel).await
    }

    /// Publishes an optional payload; the `None` arm is the structured
    /// missing-payload rejection.
    ///
    /// Admission order of checks:
    /// 1. absent payload → [`PublishError::NullPayload`], no counter moves;
    /// 2. bus not running → [`PublishError::NotAccepting`], no counter moves;
    /// 3. token already cancelled → [`PublishError::Cancelled`], no counter
    ///    moves;
    /// 4. `published` increments, then the enqueue runs under the configured
    ///    overflow policy — a rejected enqueue also increments `errors` and
    ///    returns the structured failure instead of panicking.
    pub async fn publish_opt<E: EventPayload>(
        &self,
        event: Option<E>,
        cancel: CancellationToken,
    ) -> Result<(), PublishError> {
        let Some(event) = event else {
            warn!(
                event = std::any::type_name::<E>(),
                "publish rejected: missing payload"
            );
            return Err(PublishError::NullPayload);
        };
        if self.state.load() != BusState::Running {
            return Err(PublishError::NotAccepting);
        }
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }

        self.metrics.record_published();
        let env = Envelope::new(event, cancel);
        let type_name = env.type_name();

        match self.queue.enqueue(env).await {
            Ok(None) => Ok(()),
            Ok(Some(evicted)) => {
                warn!(
                    event = evicted.type_name(),
                    seq = evicted.seq(),
                    "queue full: evicted oldest event"
                );
                Ok(())
            }
            Err(EnqueueError::Full) => {
                warn!(event = type_name, "publish rejected: queue full");
                self.metrics.record_admission_failure();
                Err(PublishError::QueueFull)
            }
            Err(EnqueueError::Closed) => {
                warn!(event = type_name, "publish rejected: queue closed");
                self.metrics.record_admission_failure();
                Err(PublishError::Closed)
            }
        }
    }

    /// Fire-and-forget convenience wrapper: failures are logged at warn and
    /// never propagated to the caller.
    pub async fn publish_forget<E: EventPayload>(&self, event: E) {
        if let Err(err) = self.publish(event).await {
            warn!(
                error = %err,
                label = err.as_label(),
                "fire-and-forget publish failed"
            );
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BusState {
        self.state.load()
    }

    /// Point-in-time statistics snapshot.
    ///
    /// Composed from independent atomic reads: eventually consistent, never
    /// torn. `active_subscriptions` comes from the resolver's registration
    /// count (best-effort).
    pub fn stats(&self) -> BusStats {
        self.metrics.snapshot(self.resolver.subscription_count())
    }

    /// Gracefully shuts the bus down.
    ///
    /// The first call transitions to `Draining`, closes the queue to new
    /// enqueues (releasing any blocked producers), and waits up to the
    /// configured grace period for the dispatcher to finish draining queued
    /// items. On expiry the dispatcher is force-stopped between events and
    /// remaining queued items are abandoned —
    /// [`ShutdownError::GraceExceeded`] reports how many.
    ///
    /// The bus ends in `Stopped` state regardless of the outcome. Subsequent
    /// calls return `Ok(())` without re-running the sequence.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        if !self.state.advance(BusState::Draining) {
            return Ok(());
        }
        info!(grace = ?self.cfg.grace, "bus shutting down");
        self.queue.close().await;

        let handle = self.dispatcher.lock().await.take();
        let result = match handle {
            None => Ok(()),
            Some(handle) => self.drain_with_grace(handle).await,
        };

        self.state.advance(BusState::Stopped);
        result
    }

    /// Waits for the dispatcher to drain within the grace period, forcing a
    /// stop on expiry.
    async fn drain_with_grace(&self, handle: JoinHandle<()>) -> Result<(), ShutdownError> {
        match tokio::time::timeout(self.cfg.grace, handle).await {
            Ok(Ok(())) => {
                info!("bus drained within grace");
                Ok(())
            }
            Ok(Err(join_err)) => {
                error!(error = %join_err, "dispatcher terminated abnormally");
                Err(ShutdownError::DispatcherPanicked)
            }
            Err(_elapsed) => {
                // Cancel first: the dispatcher's select is biased toward the
                // stop token, so nothing further leaves the queue and the
                // length read below is the exact abandoned count.
                self.stop.cancel();
                let abandoned = self.queue.len().await;
                error!(
                    abandoned,
                    grace = ?self.cfg.grace,
                    "shutdown grace exceeded; abandoning queued events"
                );
                Err(ShutdownError::GraceExceeded {
                    grace: self.cfg.grace,
                    abandoned,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::events::OverflowPolicy;
    use crate::handlers::{Handle, HandlerRegistry};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug)]
    struct Ping(u32);

    /// Counts invocations; optionally fails every call; optionally gates on
    /// a notify so tests can hold the dispatcher mid-event.
    struct Probe {
        calls: Arc<AtomicUsize>,
        fail: bool,
        entered: Option<Arc<Notify>>,
        release: Option<Arc<Notify>>,
    }

    impl Probe {
        fn counting(calls: &Arc<AtomicUsize>) -> Self {
            Self {
                calls: Arc::clone(calls),
                fail: false,
                entered: None,
                release: None,
            }
        }

        fn failing(calls: &Arc<AtomicUsize>) -> Self {
            Self {
                fail: true,
                ..Self::counting(calls)
            }
        }

        fn gated(calls: &Arc<AtomicUsize>, entered: &Arc<Notify>, release: &Arc<Notify>) -> Self {
            Self {
                entered: Some(Arc::clone(entered)),
                release: Some(Arc::clone(release)),
                ..Self::counting(calls)
            }
        }
    }

    #[async_trait]
    impl Handle<Ping> for Probe {
        async fn handle(&self, _ev: &Ping, _cancel: &CancellationToken) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(entered) = &self.entered {
                entered.notify_one();
            }
            if let Some(release) = &self.release {
                release.notified().await;
            }
            if self.fail {
                Err(HandlerError::failed("boom"))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "probe"
        }
    }

    fn counting_bus(cfg: BusConfig) -> (Bus, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.on::<Ping, _>(Probe::counting(&calls));
        (Bus::start(cfg, Arc::new(registry)), calls)
    }

    #[tokio::test]
    async fn test_null_payload_rejected_without_counting() {
        let (bus, _) = counting_bus(BusConfig::default());

        let err = bus
            .publish_opt(None::<Ping>, CancellationToken::new())
            .await
            .expect_err("null payload");
        assert_eq!(err, PublishError::NullPayload);

        let stats = bus.stats();
        assert_eq!(stats.published, 0);
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.errors, 0);

        bus.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_cancelled_token_rejected_at_admission() {
        let (bus, calls) = counting_bus(BusConfig::default());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = bus
            .publish_with(Ping(1), cancel)
            .await
            .expect_err("cancelled");
        assert_eq!(err, PublishError::Cancelled);

        bus.shutdown().await.expect("shutdown");
        assert_eq!(bus.stats().published, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_conservation_under_block_policy() {
        let (bus, calls) = counting_bus(BusConfig::default());

        for n in 0..10 {
            bus.publish(Ping(n)).await.expect("publish");
        }
        bus.shutdown().await.expect("shutdown");

        let stats = bus.stats();
        assert_eq!(stats.published, 10);
        assert_eq!(stats.processed + stats.errors, 10);
        assert_eq!(stats.errors, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert!(stats.last_event_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_isolation_across_three_handlers() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let c = Arc::new(AtomicUsize::new(0));

        let mut registry = HandlerRegistry::new();
        registry
            .on::<Ping, _>(Probe::counting(&a))
            .on::<Ping, _>(Probe::failing(&b))
            .on::<Ping, _>(Probe::counting(&c));
        let bus = Bus::start(BusConfig::default(), Arc::new(registry));

        for n in 0..4 {
            bus.publish(Ping(n)).await.expect("publish");
        }
        bus.shutdown().await.expect("shutdown");

        // All three handlers ran for every event.
        assert_eq!(a.load(Ordering::SeqCst), 4);
        assert_eq!(b.load(Ordering::SeqCst), 4);
        assert_eq!(c.load(Ordering::SeqCst), 4);

        // One error per event, not per failing handler.
        let stats = bus.stats();
        assert_eq!(stats.published, 4);
        assert_eq!(stats.errors, 4);
        assert_eq!(stats.processed, 0);
    }

    #[tokio::test]
    async fn test_drop_oldest_with_slow_consumer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let mut registry = HandlerRegistry::new();
        registry.on::<Ping, _>(Probe::gated(&calls, &entered, &release));
        let bus = Bus::start(
            BusConfig {
                capacity: 2,
                overflow: OverflowPolicy::DropOldest,
                ..BusConfig::default()
            },
            Arc::new(registry),
        );

        // E1 reaches the handler and parks there, occupying the dispatcher.
        bus.publish(Ping(1)).await.expect("publish");
        entered.notified().await;

        // E2..E5 land in a capacity-2 queue: E2 and E3 get evicted.
        for n in 2..=5 {
            bus.publish(Ping(n)).await.expect("publish");
        }

        // Unpark every dispatch as it arrives.
        release.notify_one();
        entered.notified().await;
        release.notify_one();
        entered.notified().await;
        release.notify_one();

        bus.shutdown().await.expect("shutdown");

        let stats = bus.stats();
        assert_eq!(stats.published, 5);
        // Only E1 (mid-dispatch) plus the two most recent survived.
        assert_eq!(stats.processed, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_drop_newest_rejects_and_counts_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let mut registry = HandlerRegistry::new();
        registry.on::<Ping, _>(Probe::gated(&calls, &entered, &release));
        let bus = Bus::start(
            BusConfig {
                capacity: 1,
                overflow: OverflowPolicy::DropNewest,
                ..BusConfig::default()
            },
            Arc::new(registry),
        );

        bus.publish(Ping(1)).await.expect("publish");
        entered.notified().await;
        bus.publish(Ping(2)).await.expect("fits in queue");

        let err = bus.publish(Ping(3)).await.expect_err("queue full");
        assert_eq!(err, PublishError::QueueFull);

        release.notify_one();
        entered.notified().await;
        release.notify_one();
        bus.shutdown().await.expect("shutdown");

        let stats = bus.stats();
        assert_eq!(stats.published, 3);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn test_graceful_shutdown_drains_queued_events() {
        let (bus, calls) = counting_bus(BusConfig {
            capacity: 16,
            ..BusConfig::default()
        });

        for n in 0..10 {
            bus.publish(Ping(n)).await.expect("publish");
        }
        bus.shutdown().await.expect("drains within grace");

        assert_eq!(bus.stats().processed, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(bus.state(), BusState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_grace_abandons_queued_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let mut registry = HandlerRegistry::new();
        registry.on::<Ping, _>(Probe::gated(&calls, &entered, &release));
        let bus = Bus::start(
            BusConfig {
                capacity: 16,
                grace: Duration::ZERO,
                ..BusConfig::default()
            },
            Arc::new(registry),
        );

        // First event parks in its handler; the rest stay queued.
        bus.publish(Ping(1)).await.expect("publish");
        entered.notified().await;
        for n in 2..=5 {
            bus.publish(Ping(n)).await.expect("publish");
        }

        let err = bus.shutdown().await.expect_err("grace exceeded");
        match err {
            ShutdownError::GraceExceeded { abandoned, .. } => assert_eq!(abandoned, 4),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(bus.state(), BusState::Stopped);

        // Abandoned events are never processed; nothing left the queue after
        // the force-stop, so only the mid-dispatch event ever saw a handler.
        let stats = bus.stats();
        assert_eq!(stats.published, 5);
        assert!(stats.processed <= 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_after_shutdown_fails_fast() {
        let (bus, _) = counting_bus(BusConfig::default());
        bus.shutdown().await.expect("shutdown");

        let err = bus.publish(Ping(1)).await.expect_err("not accepting");
        assert_eq!(err, PublishError::NotAccepting);
        assert_eq!(bus.stats().published, 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (bus, _) = counting_bus(BusConfig::default());
        bus.shutdown().await.expect("first shutdown");
        bus.shutdown().await.expect("second shutdown is a no-op");
        assert_eq!(bus.state(), BusState::Stopped);
    }

    #[tokio::test]
    async fn test_publish_forget_swallows_failures() {
        let (bus, _) = counting_bus(BusConfig::default());
        bus.shutdown().await.expect("shutdown");

        // Bus is stopped; wrapper must not propagate the failure.
        bus.publish_forget(Ping(1)).await;
        assert_eq!(bus.stats().published, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_and_snapshot_readers() {
        let (bus, _) = counting_bus(BusConfig {
            capacity: 64,
            ..BusConfig::default()
        });
        let bus = Arc::new(bus);

        let mut producers = Vec::new();
        for _ in 0..4 {
            let bus = Arc::clone(&bus);
            producers.push(tokio::spawn(async move {
                for n in 0..50 {
                    bus.publish(Ping(n)).await.expect("publish");
                }
            }));
        }

        let reader = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                let mut last = bus.stats();
                for _ in 0..200 {
                    let now = bus.stats();
                    // Counters never appear to move backward.
                    assert!(now.published >= last.published);
                    assert!(now.processed >= last.processed);
                    assert!(now.errors >= last.errors);
                    last = now;
                    tokio::task::yield_now().await;
                }
            })
        };

        for p in producers {
            p.await.expect("producer");
        }
        reader.await.expect("reader");
        bus.shutdown().await.expect("shutdown");

        let stats = bus.stats();
        assert_eq!(stats.published, 200);
        assert_eq!(stats.processed + stats.errors, 200);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_cancelled_at_dispatch_counts_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let mut registry = HandlerRegistry::new();
        registry.on::<Ping, _>(Probe::gated(&calls, &entered, &release));
        let bus = Bus::start(BusConfig::default(), Arc::new(registry));

        // Hold the dispatcher on a first event so the second sits queued.
        bus.publish(Ping(1)).await.expect("publish");
        entered.notified().await;

        let cancel = CancellationToken::new();
        bus.publish_with(Ping(2), cancel.clone())
            .await
            .expect("publish");
        cancel.cancel();

        release.notify_one();
        bus.shutdown().await.expect("shutdown");

        let stats = bus.stats();
        assert_eq!(stats.published, 2);
        // The cancelled event was skipped: neither processed nor errored.
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stats_reports_active_subscriptions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry
            .on::<Ping, _>(Probe::counting(&calls))
            .on::<Ping, _>(Probe::counting(&calls));
        let bus = Bus::start(BusConfig::default(), Arc::new(registry));

        assert_eq!(bus.stats().active_subscriptions, 2);
        bus.shutdown().await.expect("shutdown");
    }
}
