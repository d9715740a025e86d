/// Subscription registration and removal
use super::core::{NotificationBus, NotificationCallback, NotificationKey, Slot, Subscription};
use super::notification::Notification;
use crate::error::EventError;
use crate::types::{describe_scope, ObjectRef, SubscriptionId};
use std::any::{type_name, Any};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

impl NotificationBus {
    /// Registers `observer` for `event`, optionally scoped to `subject`.
    ///
    /// The observer is held weakly. Once it is dropped the registration
    /// becomes inert: dispatch skips it and prunes it afterwards.
    ///
    /// # Arguments
    ///
    /// * `observer` - Object whose method is called
    /// * `event` - Event name (e.g. `"fonts:did_open"`)
    /// * `subject` - Restrict to notifications about this object, `None` for global
    /// * `method` - Called with the live observer and the notification
    pub fn subscribe<O, F>(
        &self,
        observer: &Arc<O>,
        event: &str,
        subject: Option<&ObjectRef>,
        method: F,
    ) -> SubscriptionId
    where
        O: Any + Send + Sync,
        F: Fn(&O, &Notification) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let callback: NotificationCallback = Arc::new(
            move |target: &(dyn Any + Send + Sync), notification: &Notification| match target
                .downcast_ref::<O>()
            {
                Some(observer) => method(observer, notification),
                None => Err(EventError::HandlerExecution(format!(
                    "observer is not a {}",
                    type_name::<O>()
                ))),
            },
        );

        let subscription = Subscription {
            id: SubscriptionId::new(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            observer: ObjectRef::new(observer),
            callback,
        };
        let id = subscription.id;

        self.slots
            .entry(NotificationKey::new(event, subject))
            .or_insert_with(|| Slot::new(subject))
            .subscriptions
            .push(subscription);

        debug!(
            "📝 Subscribed {} to '{}' ({})",
            type_name::<O>(),
            event,
            describe_scope(subject)
        );
        id
    }

    /// Removes every registration of `observer` for `(event, subject)`.
    ///
    /// Returns how many registrations were removed, or
    /// [`EventError::SubscriptionNotFound`] if there were none.
    pub fn unsubscribe<O: ?Sized>(
        &self,
        observer: &Arc<O>,
        event: &str,
        subject: Option<&ObjectRef>,
    ) -> Result<usize, EventError> {
        let key = NotificationKey::new(event, subject);
        let removed = match self.slots.get_mut(&key) {
            Some(mut slot) => {
                let before = slot.subscriptions.len();
                slot.subscriptions
                    .retain(|subscription| !subscription.observer.refers_to(observer));
                before - slot.subscriptions.len()
            }
            None => 0,
        };
        self.slots
            .remove_if(&key, |_, slot| slot.subscriptions.is_empty());

        if removed == 0 {
            return Err(EventError::SubscriptionNotFound(format!(
                "'{}' ({})",
                event,
                describe_scope(subject)
            )));
        }

        debug!(
            "🗑️ Unsubscribed {} registration(s) from '{}' ({})",
            removed,
            event,
            describe_scope(subject)
        );
        Ok(removed)
    }

    /// Removes a single registration by its handle.
    pub fn unsubscribe_id(&self, id: SubscriptionId) -> Result<(), EventError> {
        let mut found = false;
        for mut slot in self.slots.iter_mut() {
            let before = slot.subscriptions.len();
            slot.subscriptions.retain(|subscription| subscription.id != id);
            if slot.subscriptions.len() != before {
                found = true;
                break;
            }
        }
        self.slots.retain(|_, slot| !slot.subscriptions.is_empty());

        if found {
            Ok(())
        } else {
            Err(EventError::SubscriptionNotFound(id.to_string()))
        }
    }

    /// Removes every registration held by `observer`, whatever the key.
    ///
    /// Intended for teardown; returns the number removed and never fails.
    pub fn unsubscribe_observer<O: ?Sized>(&self, observer: &Arc<O>) -> usize {
        let mut removed = 0;
        for mut slot in self.slots.iter_mut() {
            let before = slot.subscriptions.len();
            slot.subscriptions
                .retain(|subscription| !subscription.observer.refers_to(observer));
            removed += before - slot.subscriptions.len();
        }
        self.slots.retain(|_, slot| !slot.subscriptions.is_empty());

        if removed > 0 {
            debug!("🗑️ Removed {} registration(s) for departing observer", removed);
        }
        removed
    }

    /// True if `observer` is registered for `(event, subject)`.
    pub fn has_subscription<O: ?Sized>(
        &self,
        observer: &Arc<O>,
        event: &str,
        subject: Option<&ObjectRef>,
    ) -> bool {
        self.slots
            .get(&NotificationKey::new(event, subject))
            .map(|slot| {
                slot.subscriptions
                    .iter()
                    .any(|subscription| subscription.observer.refers_to(observer))
            })
            .unwrap_or(false)
    }
}
