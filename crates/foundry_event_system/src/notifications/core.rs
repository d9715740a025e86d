/// Core NotificationBus implementation
use super::notification::Notification;
use super::stats::NotificationStats;
use crate::error::EventError;
use crate::types::{ObjectKey, ObjectRef, SubscriptionId};
use dashmap::DashMap;
use std::any::Any;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

/// Type-erased observer method. Receives the upgraded observer.
pub(super) type NotificationCallback =
    Arc<dyn Fn(&(dyn Any + Send + Sync), &Notification) -> Result<(), EventError> + Send + Sync>;

/// One (observer, method) registration.
#[derive(Clone)]
pub(super) struct Subscription {
    pub(super) id: SubscriptionId,
    /// Global registration order, used to merge subject and global tables.
    pub(super) sequence: u64,
    pub(super) observer: ObjectRef,
    pub(super) callback: NotificationCallback,
}

/// Table key: event name plus optional subject identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct NotificationKey {
    pub(super) event: String,
    pub(super) subject: Option<ObjectKey>,
}

impl NotificationKey {
    pub(super) fn new(event: &str, subject: Option<&ObjectRef>) -> Self {
        Self {
            event: event.to_string(),
            subject: subject.map(ObjectRef::key),
        }
    }
}

/// Subscriptions registered under one key, in registration order.
pub(super) struct Slot {
    /// Pins the subject allocation so its key cannot be reused.
    pub(super) subject: Option<ObjectRef>,
    pub(super) subscriptions: Vec<Subscription>,
}

impl Slot {
    pub(super) fn new(subject: Option<&ObjectRef>) -> Self {
        Self {
            subject: subject.cloned(),
            subscriptions: Vec::new(),
        }
    }
}

/// In-process publish/subscribe hub.
///
/// Maps an event name and an optional subject to an ordered list of weakly
/// held observers. Dispatch is synchronous and runs on the caller's thread;
/// the subscriber list is snapshotted before any callback runs, so callbacks
/// may subscribe, unsubscribe or publish freely.
///
/// # Matching
///
/// - `publish(event, Some(subject), ..)` reaches observers registered for
///   `(event, subject)` and observers registered for `(event, None)`.
/// - `publish(event, None, ..)` reaches only observers registered for
///   `(event, None)`.
/// - Delivery follows registration order across both tables.
///
/// # Examples
///
/// ```rust
/// use foundry_event_system::*;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter(AtomicUsize);
///
/// let bus = NotificationBus::new();
/// let counter = Arc::new(Counter(AtomicUsize::new(0)));
/// bus.subscribe(&counter, "fonts:did_open", None, |counter: &Counter, _| {
///     counter.0.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// bus.publish("fonts:did_open", None, None);
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub struct NotificationBus {
    pub(super) slots: DashMap<NotificationKey, Slot>,
    pub(super) sequence: AtomicU64,
    pub(super) stats: Mutex<NotificationStats>,
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("keys", &self.slots.len())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl NotificationBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            sequence: AtomicU64::new(0),
            stats: Mutex::new(NotificationStats::default()),
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
