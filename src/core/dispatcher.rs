//! # Dispatcher: the single-consumer processing loop.
//!
//! One background task drains the bounded queue and fans each event out to
//! its resolved handlers. The queue decouples producers from consumers, but
//! dispatch itself is strictly sequential across events: event N+1 is not
//! started until every handler of event N has finished.
//!
//! ## Loop iteration
//! ```text
//! dequeue() ──► cancelled? ──► skip (neither processed nor error)
//!     │
//!     ▼
//! resolve(type_id) ── Err ──► log + record_error, continue
//!     │
//!     ▼ (possibly empty set)
//! join_all(handlers)           each invocation wrapped individually:
//!     │                        Err / panic → logged, siblings unaffected
//!     ▼
//! any failure? ──► record_error (once per event)
//! none?        ──► record_processed
//! ```
//!
//! ## Termination
//! - queue closed **and** drained → clean exit;
//! - forced-stop token cancelled (shutdown grace expired) → exit between
//!   events, remaining queued items abandoned;
//! - a panic escaping the loop's own control logic terminates the task: the
//!   bus stops processing and the failure surfaces through static metrics
//!   and the shutdown result. No automatic restart.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::events::{Envelope, EventQueue};
use crate::handlers::{EventHandler, ResolveHandlers};
use crate::metrics::BusMetrics;

/// Background processing loop; owns the consumer side of the queue.
pub(crate) struct Dispatcher {
    queue: Arc<EventQueue>,
    resolver: Arc<dyn ResolveHandlers>,
    metrics: Arc<BusMetrics>,
    /// Forced-stop signal, cancelled when the shutdown grace period expires.
    stop: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(
        queue: Arc<EventQueue>,
        resolver: Arc<dyn ResolveHandlers>,
        metrics: Arc<BusMetrics>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            queue,
            resolver,
            metrics,
            stop,
        }
    }

    /// Runs until the queue reports closed-and-drained or the forced-stop
    /// token fires. The current event's fan-out always completes before the
    /// stop signal is observed.
    pub(crate) async fn run(self) {
        loop {
            let env = tokio::select! {
                // Biased: a pending force-stop wins over a ready dequeue, so
                // no event leaves the queue after the stop token fires and
                // shutdown's abandoned count stays exact.
                biased;
                _ = self.stop.cancelled() => {
                    debug!("dispatcher force-stopped; abandoning remaining queued events");
                    break;
                }
                env = self.queue.dequeue() => match env {
                    Some(env) => env,
                    None => break,
                },
            };
            self.dispatch(env).await;
        }
        debug!("dispatcher loop terminated");
    }

    /// Dispatches one envelope: resolve, fan out, record exactly one outcome.
    async fn dispatch(&self, env: Envelope) {
        if env.cancel().is_cancelled() {
            // Cancelled before dispatch: dropped silently, counts as neither
            // processed nor error.
            debug!(event = env.type_name(), seq = env.seq(), "skipping cancelled event");
            return;
        }

        let Some(handlers) = self.resolve(&env) else {
            self.metrics.record_error();
            return;
        };

        if handlers.is_empty() {
            // No-op successful dispatch.
            debug!(event = env.type_name(), seq = env.seq(), "no handlers registered");
            self.metrics.record_processed();
            return;
        }

        let outcomes = join_all(handlers.iter().map(|h| self.invoke(h, &env))).await;
        if outcomes.iter().any(|ok| !ok) {
            // Once per event, regardless of how many handlers failed.
            self.metrics.record_error();
        } else {
            self.metrics.record_processed();
        }
    }

    /// Resolves the handler set for one event, shielding the loop from a
    /// resolver that returns an error or panics. `None` means the event is
    /// errored (already logged).
    fn resolve(&self, env: &Envelope) -> Option<Vec<Arc<dyn EventHandler>>> {
        let resolver = &self.resolver;
        let resolved =
            std::panic::catch_unwind(AssertUnwindSafe(|| resolver.resolve(env.type_id())));
        match resolved {
            Ok(Ok(handlers)) => Some(handlers),
            Ok(Err(err)) => {
                error!(
                    event = env.type_name(),
                    seq = env.seq(),
                    error = %err,
                    "handler resolution failed"
                );
                None
            }
            Err(panic) => {
                error!(
                    event = env.type_name(),
                    seq = env.seq(),
                    "handler resolution panicked: {panic:?}"
                );
                None
            }
        }
    }

    /// Invokes one handler, isolating its failure from siblings and from the
    /// loop. Returns `true` on success.
    async fn invoke(&self, handler: &Arc<dyn EventHandler>, env: &Envelope) -> bool {
        let fut = handler.handle(env, env.cancel());
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(
                    handler = handler.name(),
                    event = env.type_name(),
                    seq = env.seq(),
                    error = %err,
                    "handler failed"
                );
                false
            }
            Err(panic) => {
                error!(
                    handler = handler.name(),
                    event = env.type_name(),
                    seq = env.seq(),
                    "handler panicked: {panic:?}"
                );
                false
            }
        }
    }
}
