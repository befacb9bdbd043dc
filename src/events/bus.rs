//! Session-scoped event bus
//!
//! Lifecycle notifications (player joined/left, game start, spawn
//! assignment) are fanned out synchronously to registered subscribers.
//! The bus is an explicit object owned by the session context; components
//! unsubscribe (or are cleared wholesale) when they are torn down, so no
//! dangling callbacks survive a participant's destruction.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::net::transport::ClientId;
use crate::session::spawn::SpawnTransform;

/// Event categories a subscriber can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PlayerJoined,
    PlayerLeft,
    GameStart,
    SpawnAssigned,
}

/// Lifecycle notification payloads
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A participant joined; carries the new connected-player count
    PlayerJoined { count: u32 },
    /// A participant left; carries the new connected-player count
    PlayerLeft { count: u32 },
    /// The host flipped the game-started flag (fires once per session)
    GameStart,
    /// A spawn transform was assigned to one participant's vehicle
    SpawnAssigned {
        target: ClientId,
        ordinal: u32,
        transform: SpawnTransform,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::PlayerJoined { .. } => EventKind::PlayerJoined,
            SessionEvent::PlayerLeft { .. } => EventKind::PlayerLeft,
            SessionEvent::GameStart => EventKind::GameStart,
            SessionEvent::SpawnAssigned { .. } => EventKind::SpawnAssigned,
        }
    }
}

/// Identifies one subscribing component across its subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct Subscription {
    owner: SubscriberId,
    kind: EventKind,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    /// Insertion order is delivery order within one event kind
    subscriptions: SmallVec<[Subscription; 8]>,
    next_subscriber: u64,
}

/// In-process publish/subscribe channel for session lifecycle events
///
/// Delivery is synchronous, on the publishing thread, in registration
/// order. Registration is idempotent per `(subscriber, kind)` pair:
/// re-subscribing replaces the callback in place, unsubscribing an
/// unknown pair is a no-op. A handler removed during an in-flight
/// publish (including by itself) is not invoked afterwards.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identity for a subscribing component
    pub fn subscriber(&self) -> SubscriberId {
        let mut inner = self.inner.lock();
        let id = SubscriberId(inner.next_subscriber);
        inner.next_subscriber += 1;
        id
    }

    /// Register `callback` for `kind`, replacing any earlier registration
    /// of the same `(owner, kind)` pair
    pub fn subscribe<F>(&self, owner: SubscriberId, kind: EventKind, callback: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let mut inner = self.inner.lock();
        if let Some(existing) = inner
            .subscriptions
            .iter_mut()
            .find(|s| s.owner == owner && s.kind == kind)
        {
            existing.callback = callback;
        } else {
            inner.subscriptions.push(Subscription {
                owner,
                kind,
                callback,
            });
        }
    }

    /// Remove the `(owner, kind)` registration; no-op when absent
    pub fn unsubscribe(&self, owner: SubscriberId, kind: EventKind) {
        let mut inner = self.inner.lock();
        inner
            .subscriptions
            .retain(|s| !(s.owner == owner && s.kind == kind));
    }

    /// Remove every registration held by `owner` (component teardown)
    pub fn clear_subscriber(&self, owner: SubscriberId) {
        let mut inner = self.inner.lock();
        inner.subscriptions.retain(|s| s.owner != owner);
    }

    /// Deliver `event` to every current subscriber of its kind
    ///
    /// The subscriber list is snapshotted first, then each entry is
    /// re-checked against the live registrations immediately before its
    /// callback runs. The lock is not held across callbacks, so handlers
    /// may subscribe, unsubscribe, or publish reentrantly.
    pub fn publish(&self, event: &SessionEvent) {
        let kind = event.kind();
        let snapshot: Vec<SubscriberId> = {
            let inner = self.inner.lock();
            inner
                .subscriptions
                .iter()
                .filter(|s| s.kind == kind)
                .map(|s| s.owner)
                .collect()
        };

        for owner in snapshot {
            let callback = {
                let inner = self.inner.lock();
                inner
                    .subscriptions
                    .iter()
                    .find(|s| s.owner == owner && s.kind == kind)
                    .map(|s| Arc::clone(&s.callback))
            };
            if let Some(callback) = callback {
                callback(event);
            }
        }
    }

    /// Number of live subscriptions (all kinds)
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn joined(count: u32) -> SessionEvent {
        SessionEvent::PlayerJoined { count }
    }

    #[test]
    fn test_publish_delivers_to_subscriber() {
        let bus = EventBus::new();
        let sub = bus.subscriber();
        let hits = Arc::new(AtomicU32::new(0));

        let hits_clone = hits.clone();
        bus.subscribe(sub, EventKind::PlayerJoined, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&joined(1));
        bus.publish(&joined(2));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_kind_filtering() {
        let bus = EventBus::new();
        let sub = bus.subscriber();
        let hits = Arc::new(AtomicU32::new(0));

        let hits_clone = hits.clone();
        bus.subscribe(sub, EventKind::GameStart, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&joined(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.publish(&SessionEvent::GameStart);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registration_order_delivery() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3 {
            let sub = bus.subscriber();
            let order_clone = order.clone();
            bus.subscribe(sub, EventKind::PlayerJoined, move |_| {
                order_clone.lock().push(tag);
            });
        }

        bus.publish(&joined(1));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_resubscribe_replaces_callback() {
        let bus = EventBus::new();
        let sub = bus.subscriber();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let first_clone = first.clone();
        bus.subscribe(sub, EventKind::PlayerJoined, move |_| {
            first_clone.fetch_add(1, Ordering::SeqCst);
        });
        let second_clone = second.clone();
        bus.subscribe(sub, EventKind::PlayerJoined, move |_| {
            second_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&joined(1));
        // Idempotent per (subscriber, kind): one delivery, to the newest callback
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscription_count(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_pair_is_noop() {
        let bus = EventBus::new();
        let sub = bus.subscriber();
        bus.unsubscribe(sub, EventKind::GameStart);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribed_handler_not_invoked() {
        let bus = EventBus::new();
        let sub = bus.subscriber();
        let hits = Arc::new(AtomicU32::new(0));

        let hits_clone = hits.clone();
        bus.subscribe(sub, EventKind::PlayerJoined, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.unsubscribe(sub, EventKind::PlayerJoined);

        bus.publish(&joined(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_unsubscribing_later_handler_mid_publish() {
        // The first handler removes the second during delivery; the second
        // must not run for the in-flight event.
        let bus = Arc::new(EventBus::new());
        let first = bus.subscriber();
        let second = bus.subscriber();
        let hits = Arc::new(AtomicU32::new(0));

        let bus_clone = bus.clone();
        bus.subscribe(first, EventKind::PlayerJoined, move |_| {
            bus_clone.unsubscribe(second, EventKind::PlayerJoined);
        });
        let hits_clone = hits.clone();
        bus.subscribe(second, EventKind::PlayerJoined, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&joined(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_self_unsubscribe_during_publish() {
        // A handler tearing itself down mid-publish must not crash and
        // must not be invoked again on later publishes.
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscriber();
        let hits = Arc::new(AtomicU32::new(0));

        let bus_clone = bus.clone();
        let hits_clone = hits.clone();
        bus.subscribe(sub, EventKind::PlayerJoined, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            bus_clone.unsubscribe(sub, EventKind::PlayerJoined);
        });

        bus.publish(&joined(1));
        bus.publish(&joined(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_subscriber_drops_all_kinds() {
        let bus = EventBus::new();
        let sub = bus.subscriber();
        bus.subscribe(sub, EventKind::PlayerJoined, |_| {});
        bus.subscribe(sub, EventKind::GameStart, |_| {});
        assert_eq!(bus.subscription_count(), 2);

        bus.clear_subscriber(sub);
        assert_eq!(bus.subscription_count(), 0);
    }
}
