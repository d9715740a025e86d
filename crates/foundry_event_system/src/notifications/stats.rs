/// Statistics and monitoring for the notification bus
use serde::{Deserialize, Serialize};

/// Dispatch counters for a [`NotificationBus`](super::NotificationBus).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationStats {
    /// Calls to `publish`, including those nobody observed.
    pub events_published: u64,
    /// Live observer invocations.
    pub notifications_delivered: u64,
    /// Invocations that returned an error.
    pub handler_failures: u64,
    /// Registrations removed because their observer or subject was dropped.
    pub dead_observers_pruned: u64,
    /// Registrations currently held.
    pub total_subscriptions: usize,
}
