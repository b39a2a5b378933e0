//! # Stream Broker
//!
//! In-memory fan-out of resource updates to live subscribers, keyed by resource id.
//!
//! Each subscriber owns a bounded queue ([`StreamBroker::DEFAULT_CAPACITY`] pending updates
//! unless configured otherwise). [`StreamBroker::broadcast`] never waits on a subscriber: a full
//! queue drops that subscriber's update and the broadcaster moves on. Freshness over
//! completeness; a subscriber that falls behind re-reads the resource.
//!
//! The registry sits behind a read-write lock. Broadcasts and counts share the read side;
//! subscribe and unsubscribe take the write side. The lock is never held across an await.
//!
//! Registrations live in process memory only and are gone after a restart.

use crate::resource::ApiResource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

pub type SubscriptionId = u64;

struct Registration<R> {
    id: SubscriptionId,
    sender: mpsc::Sender<R>,
}

/// Receive end of one subscription.
///
/// Dropping it is enough to stop receiving; the broker prunes the registration on the next
/// broadcast. [`StreamBroker::unsubscribe`] removes it immediately.
#[derive(Debug)]
pub struct Subscription<R> {
    id: SubscriptionId,
    resource_id: String,
    receiver: mpsc::Receiver<R>,
}

impl<R> Subscription<R> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Waits for the next update. `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<R> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<R> {
        self.receiver.try_recv().ok()
    }
}

pub struct StreamBroker<R> {
    subscribers: RwLock<HashMap<String, Vec<Registration<R>>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl<R: ApiResource> Default for StreamBroker<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ApiResource> StreamBroker<R> {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// `capacity` is the per-subscriber queue bound (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Registration<R>>>> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Registration<R>>>> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a new bounded queue under `resource_id`.
    pub fn subscribe(&self, resource_id: impl Into<String>) -> Subscription<R> {
        let resource_id = resource_id.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.capacity);

        let mut subscribers = self.write();
        let registrations = subscribers.entry(resource_id.clone()).or_default();
        registrations.push(Registration { id, sender });
        debug!(
            resource_id = %resource_id,
            subscription = id,
            subscribers = registrations.len(),
            "Subscribed"
        );

        Subscription {
            id,
            resource_id,
            receiver,
        }
    }

    /// Removes and closes a subscription's queue. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, resource_id: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.write();
        let Some(registrations) = subscribers.get_mut(resource_id) else {
            return false;
        };
        let before = registrations.len();
        // Dropping the sender closes the queue; the receiver drains what is buffered.
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() < before;
        let remaining = registrations.len();
        if remaining == 0 {
            subscribers.remove(resource_id);
        }
        if removed {
            debug!(resource_id, subscription = id, subscribers = remaining, "Unsubscribed");
        }
        removed
    }

    /// Offers `resource` to every subscriber of its id without blocking. Returns how many
    /// queues accepted it.
    pub fn broadcast(&self, resource: &R) -> usize {
        let resource_id = resource.id();
        let mut delivered = 0;
        let mut dropped = 0;
        let mut closed = 0;

        {
            let subscribers = self.read();
            let Some(registrations) = subscribers.get(resource_id) else {
                return 0;
            };
            for registration in registrations {
                match registration.sender.try_send(resource.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        warn!(
                            resource_id,
                            subscription = registration.id,
                            "Subscriber queue full, dropping update"
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed += 1,
                }
            }
        }

        if closed > 0 {
            self.prune(resource_id);
        }
        debug!(resource_id, delivered, dropped, closed, "Broadcast");
        delivered
    }

    pub fn subscriber_count(&self, resource_id: &str) -> usize {
        self.read().get(resource_id).map(Vec::len).unwrap_or(0)
    }

    fn prune(&self, resource_id: &str) {
        let mut subscribers = self.write();
        if let Some(registrations) = subscribers.get_mut(resource_id) {
            registrations.retain(|r| !r.sender.is_closed());
            if registrations.is_empty() {
                subscribers.remove(resource_id);
            }
        }
    }
}
