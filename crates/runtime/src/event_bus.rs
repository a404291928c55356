use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

/// Named topics carried by the [`NotificationBus`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    LinkConnected,
    LinkDisconnected,
    VehicleSelected,
    GeofileLoaded,
    GeofileCleared,
    MissionStartRequested,
    MissionClearRequested,
    CoverageAltitudeChanged,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::LinkConnected,
        Topic::LinkDisconnected,
        Topic::VehicleSelected,
        Topic::GeofileLoaded,
        Topic::GeofileCleared,
        Topic::MissionStartRequested,
        Topic::MissionClearRequested,
        Topic::CoverageAltitudeChanged,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Topic::LinkConnected => "link-connected",
            Topic::LinkDisconnected => "link-disconnected",
            Topic::VehicleSelected => "vehicle-selected",
            Topic::GeofileLoaded => "geofile-loaded",
            Topic::GeofileCleared => "geofile-cleared",
            Topic::MissionStartRequested => "mission-start-requested",
            Topic::MissionClearRequested => "mission-clear-requested",
            Topic::CoverageAltitudeChanged => "coverage-altitude-changed",
        }
    }

    pub fn from_name(name: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One published notification.
///
/// The payload is unvalidated JSON; subscribers check its shape themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub topic: Topic,
    /// Bus-wide publish counter, useful for tracing only.
    pub sequence: u64,
    pub payload: Value,
}

impl Notification {
    pub fn payload_u64(&self) -> Option<u64> {
        self.payload.as_u64()
    }

    pub fn payload_f64(&self) -> Option<f64> {
        self.payload.as_f64()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    topic: Topic,
    active: Arc<AtomicBool>,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    next_sequence: u64,
    subscribers: Vec<Subscriber>,
}

/// Process-wide, synchronous, at-most-once publish/subscribe.
///
/// Delivery contract:
/// - A publish runs every matching handler before returning, in registration order.
/// - Nothing is retained: a subscriber registered after a publish never sees it.
///   Consumers that need state as of mount time must also query it once.
/// - No ordering is promised between publishes from different components.
/// - Handlers may publish, subscribe or unsubscribe reentrantly. A handler
///   registered during a publish is not part of that publish; one cancelled
///   during a publish is skipped if it has not run yet.
#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Arc<Mutex<BusInner>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared instance for applications that do not inject their own.
    pub fn global() -> &'static NotificationBus {
        static GLOBAL: OnceLock<NotificationBus> = OnceLock::new();
        GLOBAL.get_or_init(NotificationBus::new)
    }

    /// Registers `handler` for `topic`.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// cancelled or dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            topic,
            active: active.clone(),
            handler: Arc::new(handler),
        });
        Subscription {
            id,
            active,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `payload` to every current subscriber of `topic`.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, topic: Topic, payload: Value) -> usize {
        let (notification, targets) = {
            let mut inner = self.inner.lock();
            let sequence = inner.next_sequence;
            inner.next_sequence += 1;
            let targets: Vec<(Arc<AtomicBool>, Handler)> = inner
                .subscribers
                .iter()
                .filter(|s| s.topic == topic)
                .map(|s| (s.active.clone(), s.handler.clone()))
                .collect();
            (
                Notification {
                    topic,
                    sequence,
                    payload,
                },
                targets,
            )
        };

        // Handlers run without the lock held so they can touch the bus.
        let mut delivered = 0;
        for (active, handler) in targets {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            handler(&notification);
            delivered += 1;
        }
        trace!(topic = %topic, sequence = notification.sequence, delivered, "bus publish");
        delivered
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }

    fn remove(inner: &Mutex<BusInner>, id: SubscriptionId) {
        inner.lock().subscribers.retain(|s| s.id != id);
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("NotificationBus")
            .field("subscribers", &inner.subscribers.len())
            .field("published", &inner.next_sequence)
            .finish()
    }
}

/// Registration handle returned by [`NotificationBus::subscribe`].
///
/// Cancelling is idempotent; dropping cancels.
pub struct Subscription {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    bus: Weak<Mutex<BusInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn cancel(&mut self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            NotificationBus::remove(&inner, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
