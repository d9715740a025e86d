/// Notification publishing and dispatch
use super::core::{NotificationBus, NotificationKey, Subscription};
use super::notification::Notification;
use crate::types::{ObjectRef, Payload, SubscriptionId};
use crate::utils::lock;
use tracing::{error, trace};

impl NotificationBus {
    /// Publishes `event` and synchronously invokes every matching observer.
    ///
    /// Matching subscriptions are snapshotted before the first callback
    /// runs. A callback that returns an error is logged and counted; the
    /// remaining observers still run. Dead observers are skipped and
    /// pruned once dispatch completes.
    ///
    /// Returns the number of live observers invoked.
    pub fn publish(&self, event: &str, subject: Option<&ObjectRef>, data: Option<Payload>) -> usize {
        let snapshot = self.matching_subscriptions(event, subject);
        lock(&self.stats).events_published += 1;

        if snapshot.is_empty() {
            trace!("📤 No observers for '{}'", event);
            return 0;
        }

        trace!("📤 Publishing '{}' to {} observer(s)", event, snapshot.len());
        let notification = Notification::new(event, subject.cloned(), data);
        let mut delivered = 0;
        let mut failures = 0;
        let mut dead: Vec<SubscriptionId> = Vec::new();

        for subscription in &snapshot {
            let Some(target) = subscription.observer.upgrade() else {
                dead.push(subscription.id);
                continue;
            };
            delivered += 1;
            if let Err(e) = (subscription.callback)(target.as_ref(), &notification) {
                failures += 1;
                error!(
                    "❌ Observer {} failed handling '{}': {}",
                    subscription.observer.type_name(),
                    event,
                    e
                );
            }
        }

        if !dead.is_empty() {
            self.prune_subscriptions(&dead);
        }

        let mut stats = lock(&self.stats);
        stats.notifications_delivered += delivered as u64;
        stats.handler_failures += failures;
        stats.dead_observers_pruned += dead.len() as u64;
        delivered
    }

    /// Collects the subject and global registrations for `event`, merged
    /// in registration order.
    fn matching_subscriptions(&self, event: &str, subject: Option<&ObjectRef>) -> Vec<Subscription> {
        let mut snapshot: Vec<Subscription> = Vec::new();
        if subject.is_some() {
            if let Some(slot) = self.slots.get(&NotificationKey::new(event, subject)) {
                snapshot.extend(slot.subscriptions.iter().cloned());
            }
        }
        if let Some(slot) = self.slots.get(&NotificationKey::new(event, None)) {
            snapshot.extend(slot.subscriptions.iter().cloned());
        }
        snapshot.sort_by_key(|subscription| subscription.sequence);
        snapshot
    }
}
