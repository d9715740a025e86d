/// Table maintenance and statistics access
use super::core::NotificationBus;
use super::stats::NotificationStats;
use crate::types::{ObjectKey, SubscriptionId};
use crate::utils::lock;
use tracing::debug;

impl NotificationBus {
    /// Drops every table keyed on `subject`.
    ///
    /// Called when a subject goes away so its registrations do not outlive
    /// it. Global registrations are untouched. Returns the number removed.
    pub fn purge_subject(&self, subject: ObjectKey) -> usize {
        let mut removed = 0;
        self.slots.retain(|key, slot| {
            if key.subject == Some(subject) {
                removed += slot.subscriptions.len();
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!("🗑️ Purged {} registration(s) for subject {}", removed, subject);
        }
        removed
    }

    /// Removes registrations whose observer or subject has been dropped.
    ///
    /// Dispatch already skips these; this reclaims the table space for keys
    /// that are never published again.
    pub fn collect_garbage(&self) -> usize {
        let mut removed = 0;
        self.slots.retain(|_, slot| {
            let subject_gone = slot.subject.as_ref().is_some_and(|subject| !subject.is_alive());
            if subject_gone {
                removed += slot.subscriptions.len();
                return false;
            }
            let before = slot.subscriptions.len();
            slot.subscriptions.retain(|subscription| subscription.observer.is_alive());
            removed += before - slot.subscriptions.len();
            !slot.subscriptions.is_empty()
        });
        if removed > 0 {
            lock(&self.stats).dead_observers_pruned += removed as u64;
            debug!("🗑️ Collected {} stale registration(s)", removed);
        }
        removed
    }

    /// Removes every registration. Returns how many there were.
    pub fn clear(&self) -> usize {
        let removed = self.subscription_count();
        self.slots.clear();
        removed
    }

    /// Total registrations across all keys.
    pub fn subscription_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.subscriptions.len())
            .sum()
    }

    /// Sorted, de-duplicated event names with at least one registration.
    pub fn registered_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self
            .slots
            .iter()
            .map(|entry| entry.key().event.clone())
            .collect();
        events.sort();
        events.dedup();
        events
    }

    /// Snapshot of the dispatch counters.
    pub fn stats(&self) -> NotificationStats {
        let mut stats = lock(&self.stats).clone();
        stats.total_subscriptions = self.subscription_count();
        stats
    }

    pub(super) fn prune_subscriptions(&self, ids: &[SubscriptionId]) {
        for mut slot in self.slots.iter_mut() {
            slot.subscriptions
                .retain(|subscription| !ids.contains(&subscription.id));
        }
        self.slots.retain(|_, slot| !slot.subscriptions.is_empty());
        debug!("🗑️ Pruned {} dead observer(s)", ids.len());
    }
}
