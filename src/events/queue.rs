//! # Bounded event queue with configurable overflow policy.
//!
//! [`EventQueue`] is the only structure shared between publisher threads and
//! the dispatcher: a fixed-capacity FIFO supporting many concurrent producers
//! and exactly one consumer.
//!
//! ## Overflow policies
//! - [`OverflowPolicy::Block`]: a producer suspends on a capacity semaphore
//!   until space frees — the only policy that exerts true backpressure.
//! - [`OverflowPolicy::DropNewest`]: a full queue rejects the incoming item
//!   ([`EnqueueError::Full`]); the caller decides how to report it.
//! - [`OverflowPolicy::DropOldest`]: a full queue evicts its oldest item to
//!   admit the new one; the evicted envelope is handed back for logging.
//!
//! Exactly one policy is active per queue, fixed at construction.
//!
//! ## Rules
//! - `dequeue()` suspends while empty and returns `None` only once the queue
//!   is closed **and** drained.
//! - `close()` releases blocked producers with [`EnqueueError::Closed`];
//!   already-queued items still drain.
//! - Single consumer: only the dispatcher calls `dequeue()`.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify, Semaphore};

use super::envelope::Envelope;

/// Rule governing producer behavior when the bounded queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Producer suspends until space frees (backpressure on publishers).
    #[default]
    Block,
    /// The incoming item is rejected; the publisher is told synchronously.
    DropNewest,
    /// The oldest queued item is evicted to make room for the new one.
    DropOldest,
}

impl OverflowPolicy {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OverflowPolicy::Block => "block",
            OverflowPolicy::DropNewest => "drop_newest",
            OverflowPolicy::DropOldest => "drop_oldest",
        }
    }
}

/// Admission failure reported by [`EventQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnqueueError {
    /// Queue at capacity under [`OverflowPolicy::DropNewest`].
    Full,
    /// Queue closed; no further enqueues accepted.
    Closed,
}

/// FIFO buffer guarded by the queue mutex.
struct QueueState {
    buf: VecDeque<Envelope>,
    closed: bool,
}

/// Fixed-capacity multi-producer/single-consumer FIFO.
pub(crate) struct EventQueue {
    policy: OverflowPolicy,
    capacity: usize,
    state: Mutex<QueueState>,
    /// Capacity permits; present only under [`OverflowPolicy::Block`].
    space: Option<Semaphore>,
    /// Wakes the single consumer when an item arrives or the queue closes.
    ready: Notify,
}

impl EventQueue {
    /// Creates a queue with the given capacity (clamped to a minimum of 1)
    /// and overflow policy.
    pub(crate) fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        let space = match policy {
            OverflowPolicy::Block => Some(Semaphore::new(capacity)),
            _ => None,
        };
        Self {
            policy,
            capacity,
            state: Mutex::new(QueueState {
                buf: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            space,
            ready: Notify::new(),
        }
    }

    /// Admits one envelope according to the configured overflow policy.
    ///
    /// Returns `Ok(None)` on plain admission, `Ok(Some(evicted))` when
    /// [`OverflowPolicy::DropOldest`] displaced the oldest queued item, and
    /// [`EnqueueError`] when the item was not admitted.
    ///
    /// Suspends only under [`OverflowPolicy::Block`] on a full queue; a
    /// blocked producer is released with [`EnqueueError::Closed`] when the
    /// queue closes.
    pub(crate) async fn enqueue(&self, env: Envelope) -> Result<Option<Envelope>, EnqueueError> {
        if let Some(space) = &self.space {
            let permit = space.acquire().await.map_err(|_| EnqueueError::Closed)?;
            // The permit is restored by the consumer on dequeue.
            permit.forget();

            let mut st = self.state.lock().await;
            if st.closed {
                return Err(EnqueueError::Closed);
            }
            st.buf.push_back(env);
            self.ready.notify_one();
            return Ok(None);
        }

        let mut st = self.state.lock().await;
        if st.closed {
            return Err(EnqueueError::Closed);
        }

        let evicted = if st.buf.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropNewest => return Err(EnqueueError::Full),
                OverflowPolicy::DropOldest => st.buf.pop_front(),
                // Block producers hold a permit and never observe a full buffer here.
                OverflowPolicy::Block => None,
            }
        } else {
            None
        };

        st.buf.push_back(env);
        self.ready.notify_one();
        Ok(evicted)
    }

    /// Removes the oldest queued envelope, suspending while the queue is
    /// empty. Returns `None` once the queue is closed and fully drained.
    ///
    /// Single-consumer: must only be called from the dispatcher loop.
    pub(crate) async fn dequeue(&self) -> Option<Envelope> {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            // Register interest before the emptiness check so a notify racing
            // with the unlock below is not lost.
            notified.as_mut().enable();

            {
                let mut st = self.state.lock().await;
                if let Some(env) = st.buf.pop_front() {
                    if let Some(space) = &self.space {
                        space.add_permits(1);
                    }
                    return Some(env);
                }
                if st.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Closes the queue: no further enqueues are accepted and blocked
    /// producers are released. Already-queued items still drain.
    pub(crate) async fn close(&self) {
        let mut st = self.state.lock().await;
        st.closed = true;
        if let Some(space) = &self.space {
            space.close();
        }
        self.ready.notify_waiters();
    }

    /// Number of currently queued envelopes.
    pub(crate) async fn len(&self) -> usize {
        self.state.lock().await.buf.len()
    }
}
