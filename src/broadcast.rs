// src/broadcast.rs

//! Typed publish/subscribe channel.
//!
//! [`Broadcast`] decouples producers of discrete named events (for us:
//! restart/shutdown signals) from consumers, without the consumer polling.
//! Subscriptions are tracked by a stable [`SubscriptionId`] in a shared
//! registry, so removal never depends on closure identity, and the channel
//! handle itself is `Clone`: every producer and consumer holds a clone
//! instead of reaching for a process-wide singleton.
//!
//! Two kinds of subscribers exist:
//! - durable callbacks added via [`Broadcast::subscribe`], which stay until
//!   unsubscribed (or until they return [`Delivery::Unsubscribe`]);
//! - one-shot waiters created via [`Broadcast::wait`], which resolve a future
//!   on the first matching send and remove themselves.
//!
//! A callback must not call `send` on the channel it is subscribed to; the
//! delivery lock is held while it runs.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Stable identifier for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What a durable callback wants done with its subscription after a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Keep the subscription for future sends.
    Retain,
    /// Remove the subscription; the callback will not be invoked again.
    Unsubscribe,
}

type Callback<V> = Box<dyn FnMut(&V) -> Delivery + Send>;

enum Subscriber<V> {
    Durable(Arc<Mutex<Callback<V>>>),
    Once {
        value: V,
        tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    },
}

impl<V: Clone> Clone for Subscriber<V> {
    fn clone(&self) -> Self {
        match self {
            Subscriber::Durable(cb) => Subscriber::Durable(Arc::clone(cb)),
            Subscriber::Once { value, tx } => Subscriber::Once {
                value: value.clone(),
                tx: Arc::clone(tx),
            },
        }
    }
}

struct Registry<V> {
    next_id: u64,
    entries: HashMap<SubscriptionId, Subscriber<V>>,
}

/// Typed publish/subscribe channel; cheap to clone, all clones share one
/// subscriber registry.
pub struct Broadcast<V> {
    registry: Arc<Mutex<Registry<V>>>,
}

impl<V> Clone for Broadcast<V> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<V> Default for Broadcast<V>
where
    V: Clone + Eq + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Broadcast<V>
where
    V: Clone + Eq + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: HashMap::new(),
            })),
        }
    }

    /// Register a durable callback. It is invoked for every subsequent
    /// [`send`](Self::send) until it is unsubscribed, either externally via
    /// [`unsubscribe`](Self::unsubscribe) or by returning
    /// [`Delivery::Unsubscribe`] from a delivery.
    pub fn subscribe(&self, callback: impl FnMut(&V) -> Delivery + Send + 'static) -> SubscriptionId {
        self.insert(Subscriber::Durable(Arc::new(Mutex::new(Box::new(callback)))))
    }

    /// Remove a subscription. Returns `false` if it was already gone, so
    /// calling this twice with the same id is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.registry).entries.remove(&id).is_some()
    }

    /// Number of currently registered subscriptions (durable and one-shot).
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).entries.len()
    }

    /// Deliver `value` to every subscriber registered at the moment of the
    /// call. Delivery is synchronous; order is unspecified. A subscriber
    /// removed mid-delivery (by itself or by another subscriber) before its
    /// turn is skipped, and removals never disturb deliveries already made.
    /// Sending with zero subscribers is a valid no-op.
    pub fn send(&self, value: &V) {
        let snapshot: Vec<(SubscriptionId, Subscriber<V>)> = lock(&self.registry)
            .entries
            .iter()
            .map(|(id, sub)| (*id, sub.clone()))
            .collect();

        for (id, sub) in snapshot {
            if !lock(&self.registry).entries.contains_key(&id) {
                continue;
            }
            match sub {
                Subscriber::Durable(cb) => {
                    // The registry lock is NOT held here, so the callback may
                    // subscribe/unsubscribe freely.
                    let delivery = {
                        let mut f = lock(&cb);
                        (*f)(value)
                    };
                    if delivery == Delivery::Unsubscribe {
                        self.unsubscribe(id);
                    }
                }
                Subscriber::Once { value: wanted, tx } => {
                    if wanted == *value {
                        if let Some(tx) = lock(&tx).take() {
                            let _ = tx.send(());
                        }
                        self.unsubscribe(id);
                    }
                }
            }
        }
    }

    /// One-shot future resolving on the first `send` of `value` that happens
    /// after this call. The subscription is registered before `wait` returns,
    /// so a send issued between registration and the first poll is not
    /// missed. Dropping the future unsubscribes it.
    pub fn wait(&self, value: V) -> Wait<V> {
        let (tx, rx) = oneshot::channel();
        let id = self.insert(Subscriber::Once {
            value,
            tx: Arc::new(Mutex::new(Some(tx))),
        });
        Wait {
            rx,
            registry: Arc::clone(&self.registry),
            id,
            done: false,
        }
    }

    /// Register a wait for `until`, then send `value`, returning the wait's
    /// future. Useful when the sender of an event also needs to await its
    /// completion signal.
    pub fn send_and_wait(&self, value: &V, until: V) -> Wait<V> {
        let waiter = self.wait(until);
        self.send(value);
        waiter
    }

    fn insert(&self, sub: Subscriber<V>) -> SubscriptionId {
        let mut reg = lock(&self.registry);
        let id = SubscriptionId(reg.next_id);
        reg.next_id += 1;
        reg.entries.insert(id, sub);
        id
    }
}

/// Future returned by [`Broadcast::wait`] and [`Broadcast::send_and_wait`].
///
/// Resolves when a matching value is sent; resolves at most once. Dropping it
/// removes the underlying subscription, so no stale waiter can swallow a
/// later send.
pub struct Wait<V> {
    rx: oneshot::Receiver<()>,
    registry: Arc<Mutex<Registry<V>>>,
    id: SubscriptionId,
    done: bool,
}

impl<V> Future for Wait<V> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.done {
            // The inner receiver must not be polled again once it has
            // yielded; a dead waiter simply stays pending.
            return Poll::Pending;
        }
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(())) => {
                this.done = true;
                Poll::Ready(())
            }
            // Sender dropped without a matching send: by contract this waiter
            // never resolves.
            Poll::Ready(Err(_)) => {
                this.done = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<V> Drop for Wait<V> {
    fn drop(&mut self) {
        if !self.done {
            lock(&self.registry).entries.remove(&self.id);
        }
    }
}

// Poison-tolerant lock: a panicked subscriber must not wedge the channel.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
