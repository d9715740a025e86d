//! # Foundry Context
//!
//! The single process-wide fabric shared by every extension.
//!
//! One [`FoundryContext`] is built at startup and handed to each extension.
//! It owns the notification bus, the request bus, the font manager and the
//! activity poller, wired to the host's collaborators.

use crate::activity::{ActivityPoller, Clock, FontActivityMonitor, IdleSourceKind, IdleTimeSource, SystemClock};
use crate::config::FoundryConfig;
use crate::defaults::{InMemoryPreferenceStore, OwnerDefaults, PreferenceStore};
use crate::fonts::{FontManager, HostEnvironment};
use crate::notifications::NotificationBus;
use crate::requests::RequestBus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// What [`FoundryContext::shutdown`] drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownSummary {
    pub subscriptions: usize,
    pub responders: usize,
    pub activity_observers: usize,
}

/// The shared event fabric.
#[derive(Debug)]
pub struct FoundryContext {
    config: FoundryConfig,
    host: Arc<dyn HostEnvironment>,
    clock: Arc<dyn Clock>,
    notifications: Arc<NotificationBus>,
    requests: Arc<RequestBus>,
    fonts: Arc<FontManager>,
    font_activity: Arc<FontActivityMonitor>,
    activity: Arc<ActivityPoller>,
    preferences: Arc<dyn PreferenceStore>,
}

impl FoundryContext {
    /// Starts building a context around `host`.
    pub fn builder(host: Arc<dyn HostEnvironment>) -> FoundryContextBuilder {
        FoundryContextBuilder::new(host)
    }

    pub fn config(&self) -> &FoundryConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn HostEnvironment> {
        &self.host
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn notifications(&self) -> &Arc<NotificationBus> {
        &self.notifications
    }

    pub fn requests(&self) -> &Arc<RequestBus> {
        &self.requests
    }

    pub fn fonts(&self) -> &Arc<FontManager> {
        &self.fonts
    }

    pub fn font_activity(&self) -> &Arc<FontActivityMonitor> {
        &self.font_activity
    }

    pub fn activity(&self) -> &Arc<ActivityPoller> {
        &self.activity
    }

    pub fn preferences(&self) -> &Arc<dyn PreferenceStore> {
        &self.preferences
    }

    /// Preferences namespaced under `owner`.
    pub fn defaults_for(&self, owner: &str) -> OwnerDefaults {
        OwnerDefaults::new(owner, self.preferences.clone())
    }

    /// Host edge: the application stopped being frontmost.
    pub fn app_did_resign_active(&self) {
        self.activity.app_did_resign_active();
    }

    /// Host edge: the application became frontmost.
    pub fn app_did_become_active(&self) {
        self.activity.app_did_become_active();
    }

    /// Stops polling and drops every subscription, responder and activity
    /// observer.
    pub fn shutdown(&self) -> ShutdownSummary {
        let summary = ShutdownSummary {
            activity_observers: self.activity.remove_all_observers(),
            subscriptions: self.notifications.clear(),
            responders: self.requests.clear(),
        };
        info!(
            "🛑 Foundry context shut down: {} subscription(s), {} responder(s), {} activity observer(s)",
            summary.subscriptions, summary.responders, summary.activity_observers
        );
        summary
    }
}

/// Builder for [`FoundryContext`].
///
/// Every collaborator except the host has a default: the platform idle
/// source, the system clock, an in-memory preference store and the default
/// configuration.
pub struct FoundryContextBuilder {
    host: Arc<dyn HostEnvironment>,
    idle_source: Option<Arc<dyn IdleTimeSource>>,
    clock: Option<Arc<dyn Clock>>,
    preferences: Option<Arc<dyn PreferenceStore>>,
    config: FoundryConfig,
}

impl FoundryContextBuilder {
    pub fn new(host: Arc<dyn HostEnvironment>) -> Self {
        Self {
            host,
            idle_source: None,
            clock: None,
            preferences: None,
            config: FoundryConfig::default(),
        }
    }

    pub fn idle_source(mut self, idle_source: Arc<dyn IdleTimeSource>) -> Self {
        self.idle_source = Some(idle_source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn config(mut self, config: FoundryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<FoundryContext> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let idle_source = self
            .idle_source
            .unwrap_or_else(|| IdleSourceKind::Auto.build(clock.clone()));
        let preferences = self
            .preferences
            .unwrap_or_else(|| Arc::new(InMemoryPreferenceStore::new()));

        let notifications = Arc::new(NotificationBus::new());
        let requests = Arc::new(RequestBus::with_notifications(notifications.clone()));
        let fonts = FontManager::new(self.host.clone(), notifications.clone());
        let font_activity = FontActivityMonitor::new(&fonts, clock.clone());
        let activity = ActivityPoller::new(
            self.host.clone(),
            idle_source.clone(),
            font_activity.clone(),
            clock.clone(),
            self.config.activity.poll_interval(),
        );

        info!(
            "🚀 Foundry context ready (idle source: {}, poll interval: {:?})",
            idle_source.name(),
            activity.interval()
        );

        Arc::new(FoundryContext {
            config: self.config,
            host: self.host,
            clock,
            notifications,
            requests,
            fonts,
            font_activity,
            activity,
            preferences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityObserverOptions, ManualClock, ManualIdleTimeSource};
    use crate::fonts::InMemoryHost;
    use crate::{create_foundry_context, EventError, PollSample};
    use std::time::Duration;

    struct Extension;

    #[test]
    fn test_builder_applies_config() {
        let mut config = FoundryConfig::default();
        config.activity.poll_interval_secs = 0.5;
        let context = FoundryContext::builder(Arc::new(InMemoryHost::new()))
            .config(config)
            .idle_source(Arc::new(ManualIdleTimeSource::new()))
            .clock(Arc::new(ManualClock::new(0.0)))
            .build();

        assert_eq!(context.activity().interval(), Duration::from_millis(500));
        assert_eq!(context.config().activity.poll_interval_secs, 0.5);
        assert_eq!(context.clock().now(), 0.0);
    }

    #[test]
    fn test_shutdown_drains_everything() {
        let context = create_foundry_context(Arc::new(InMemoryHost::new()));
        let extension = Arc::new(Extension);

        context
            .notifications()
            .subscribe(&extension, "custom:event", None, |_: &Extension, _| Ok(()));
        context
            .requests()
            .register(&extension, "custom.request", None, |_: &Extension, _: ()| 1u8)
            .unwrap();
        context.activity().add_observer(
            &extension,
            ActivityObserverOptions::default(),
            |_: &Extension, _: &PollSample| Ok::<(), EventError>(()),
        );
        assert!(context.activity().is_polling());

        let summary = context.shutdown();
        assert_eq!(summary.responders, 1);
        assert_eq!(summary.activity_observers, 1);
        assert!(summary.subscriptions >= 1);
        assert!(!context.activity().is_polling());
        assert_eq!(context.notifications().subscription_count(), 0);
        assert_eq!(context.requests().responder_count(), 0);
    }

    #[test]
    fn test_defaults_are_namespaced_per_owner() {
        let context = create_foundry_context(Arc::new(InMemoryHost::new()));
        let first = context.defaults_for("first");
        let second = context.defaults_for("second");
        first.set("value", &1).unwrap();
        second.set("value", &2).unwrap();

        assert_eq!(first.get_or("value", 0), 1);
        assert_eq!(second.get_or("value", 0), 2);
        assert!(context.preferences().get("first.value").is_some());
    }
}
