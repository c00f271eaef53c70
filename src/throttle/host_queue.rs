//! Per-key serialization of outbound calls.
//!
//! # Responsibilities
//! - Run tasks sharing a key strictly one at a time, in acquisition order
//! - Let distinct keys proceed concurrently with no ordering between them
//! - Reclaim a key's slot once its last ticket settles
//!
//! # Design Decisions
//! - A ticket chains onto the previous tail at acquisition time, inside
//!   one lock acquisition, so ordering is fixed synchronously
//! - Settling is by drop: success, error, cancellation, and panic unwind
//!   all release the next waiter
//! - The epoch check on drop means only the newest ticket removes the
//!   slot; an older ticket finishing late leaves the live chain alone

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use tokio::sync::oneshot;

type TailFuture = Shared<BoxFuture<'static, ()>>;

struct Slot {
    tail: TailFuture,
    epoch: u64,
}

#[derive(Default)]
struct Inner {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Registry of per-key task chains.
#[derive(Clone, Default)]
pub struct HostQueueRegistry {
    inner: Arc<Inner>,
}

impl HostQueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the queue for `key`. Registration is synchronous: tickets for
    /// the same key run in the order `acquire` was called. Hold the ticket
    /// for the duration of the call; drop it to release the next waiter.
    pub fn acquire(&self, key: &str) -> QueueTicket {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let tail: TailFuture = async move {
            // Either signal settles the chain: an explicit send or the
            // sender dropping with the ticket.
            let _ = done_rx.await;
        }
        .boxed()
        .shared();

        let mut slots = self.inner.slots.lock().expect("host queue mutex poisoned");
        let (prior, epoch) = match slots.get_mut(key) {
            Some(slot) => {
                let prior = slot.tail.clone();
                slot.epoch += 1;
                slot.tail = tail;
                (Some(prior), slot.epoch)
            }
            None => {
                slots.insert(key.to_string(), Slot { tail, epoch: 0 });
                (None, 0)
            }
        };

        QueueTicket {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            epoch,
            prior,
            done: Some(done_tx),
        }
    }

    /// Number of keys currently holding a chain slot.
    pub fn active_keys(&self) -> usize {
        self.inner.slots.lock().expect("host queue mutex poisoned").len()
    }
}

/// A position in one key's queue. See [`HostQueueRegistry::acquire`].
pub struct QueueTicket {
    inner: Arc<Inner>,
    key: String,
    epoch: u64,
    prior: Option<TailFuture>,
    done: Option<oneshot::Sender<()>>,
}

impl QueueTicket {
    /// Resolves once every earlier ticket for this key has settled,
    /// whatever their outcomes were.
    pub async fn wait_turn(&mut self) {
        if let Some(prior) = self.prior.take() {
            prior.await;
        }
    }
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        let mut slots = self.inner.slots.lock().expect("host queue mutex poisoned");
        if let Some(slot) = slots.get(&self.key) {
            if slot.epoch == self.epoch {
                slots.remove(&self.key);
            }
        }
    }
}
