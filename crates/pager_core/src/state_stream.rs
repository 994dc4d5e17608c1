//! Latest-value broadcaster for model states.
//!
//! A [`StatePublisher`] always holds a current [`ModelState`]. Subscribing
//! replays that value synchronously before any later publication, and every
//! publication is delivered synchronously to all live subscribers.
//!
//! Delivery order per subscriber follows publish order. Each subscriber slot
//! remembers the sequence number it last saw, so a replay racing a newer
//! publication is skipped rather than delivered out of order.
//!
//! Cancellation flips the slot's gate and then waits for any in-flight
//! delivery to that slot to finish; once [`Subscription::cancel`] returns the
//! callback is never invoked again. Cancelled slots are pruned lazily on the
//! next publish or subscribe.

use std::{
    fmt,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    task::{Context, Poll},
};

use futures::Stream;
use shared::protocol::ModelState;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::trace;

type StateCallback<T> = Box<dyn FnMut(&ModelState<T>) + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct StatePublisher<T> {
    inner: Arc<PublisherShared<T>>,
}

struct PublisherShared<T> {
    state: Mutex<PublisherState<T>>,
    next_subscriber_id: AtomicU64,
}

struct PublisherState<T> {
    current: Arc<ModelState<T>>,
    seq: u64,
    subscribers: Vec<Arc<SubscriberSlot<T>>>,
}

struct SubscriberSlot<T> {
    id: u64,
    cancelled: AtomicBool,
    gate: Mutex<SlotGate<T>>,
}

struct SlotGate<T> {
    callback: StateCallback<T>,
    last_seq: Option<u64>,
}

impl<T> SubscriberSlot<T> {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn deliver(&self, seq: u64, state: &ModelState<T>) {
        if self.is_cancelled() {
            return;
        }
        let mut guard = lock(&self.gate);
        let gate = &mut *guard;
        // Re-checked under the gate: cancel() takes it after flipping the flag.
        if self.is_cancelled() {
            return;
        }
        if gate.last_seq.is_some_and(|last| last >= seq) {
            trace!(subscriber = self.id, seq, "skipping superseded state delivery");
            return;
        }
        gate.last_seq = Some(seq);
        (gate.callback)(state);
    }
}

trait SlotHandle: Send + Sync {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

impl<T: Send + Sync> SlotHandle for SubscriberSlot<T> {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        // Waits out a delivery running on another thread.
        drop(lock(&self.gate));
    }

    fn is_cancelled(&self) -> bool {
        SubscriberSlot::is_cancelled(self)
    }
}

impl<T: Send + Sync + 'static> StatePublisher<T> {
    pub fn new(initial: ModelState<T>) -> Self {
        Self {
            inner: Arc::new(PublisherShared {
                state: Mutex::new(PublisherState {
                    current: Arc::new(initial),
                    seq: 0,
                    subscribers: Vec::new(),
                }),
                next_subscriber_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn current(&self) -> Arc<ModelState<T>> {
        Arc::clone(&lock(&self.inner.state).current)
    }

    /// Number of subscriptions that have not been cancelled.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.state)
            .subscribers
            .iter()
            .filter(|slot| !slot.is_cancelled())
            .count()
    }

    /// Replaces the current value and delivers it to every live subscriber.
    pub fn publish(&self, state: ModelState<T>) {
        let state = Arc::new(state);
        let (seq, targets) = {
            let mut guard = lock(&self.inner.state);
            guard.seq += 1;
            guard.current = Arc::clone(&state);
            guard.subscribers.retain(|slot| !slot.is_cancelled());
            (guard.seq, guard.subscribers.clone())
        };
        trace!(
            seq,
            state = state.kind(),
            subscribers = targets.len(),
            "publishing model state"
        );
        for slot in targets {
            slot.deliver(seq, &state);
        }
    }

    /// Registers `callback` and immediately hands it the current value.
    ///
    /// The callback runs on whichever thread publishes. It must not cancel
    /// its own subscription from inside the callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ModelState<T>) + Send + 'static,
    {
        let slot = Arc::new(SubscriberSlot {
            id: self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed),
            cancelled: AtomicBool::new(false),
            gate: Mutex::new(SlotGate {
                callback: Box::new(callback),
                last_seq: None,
            }),
        });
        let (seq, current) = {
            let mut guard = lock(&self.inner.state);
            guard.subscribers.retain(|slot| !slot.is_cancelled());
            guard.subscribers.push(Arc::clone(&slot));
            (guard.seq, Arc::clone(&guard.current))
        };
        slot.deliver(seq, &current);
        Subscription { slot }
    }

    /// Async view of the same value: yields the current state, then every
    /// subsequent one. Dropping the stream ends the subscription.
    pub fn updates(&self) -> StateUpdates<T>
    where
        T: Clone,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |state: &ModelState<T>| {
            let _ = tx.send(state.clone());
        });
        StateUpdates {
            inner: UnboundedReceiverStream::new(rx),
            _subscription: subscription,
        }
    }
}

impl<T> Clone for StatePublisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for StatePublisher<T> {
    fn default() -> Self {
        Self::new(ModelState::Empty)
    }
}

impl<T> fmt::Debug for StatePublisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = lock(&self.inner.state);
        f.debug_struct("StatePublisher")
            .field("state", &guard.current.kind())
            .field("seq", &guard.seq)
            .field("subscribers", &guard.subscribers.len())
            .finish()
    }
}

/// Handle to a registered callback. Dropping it cancels the subscription.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    slot: Arc<dyn SlotHandle>,
}

impl Subscription {
    pub fn cancel(&self) {
        self.slot.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.slot.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.slot.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

pub struct StateUpdates<T> {
    inner: UnboundedReceiverStream<ModelState<T>>,
    _subscription: Subscription,
}

impl<T> Stream for StateUpdates<T> {
    type Item = ModelState<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[path = "tests/state_stream_tests.rs"]
mod tests;
