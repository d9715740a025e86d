/// Font-editing activity tracking
use super::clock::Clock;
use super::idle::IdleSample;
use crate::error::EventError;
use crate::fonts::{FontEvent, FontHandle, FontManager, FONT_CHANGED, FONT_DID_OPEN, FONT_WILL_CLOSE};
use crate::notifications::{Notification, NotificationBus};
use crate::types::ObjectRef;
use crate::utils::lock;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, trace};

/// Supplies the time since the last font-editing activity.
///
/// The poller calls `start_observing` when polling starts and
/// `stop_observing` when it stops.
pub trait FontActivitySource: Send + Sync + Debug {
    /// Seconds since the last font change and when it happened.
    fn font_idle_time(&self) -> IdleSample;

    fn start_observing(&self) {}

    fn stop_observing(&self) {}
}

/// Watches every open font for changes.
///
/// While observing it subscribes to the manager's open and close
/// notifications and to [`FONT_CHANGED`] on each open font. Any change
/// resets the idle clock.
#[derive(Debug)]
pub struct FontActivityMonitor {
    fonts: Weak<FontManager>,
    notifications: Arc<NotificationBus>,
    clock: Arc<dyn Clock>,
    last_activity: Mutex<Option<f64>>,
    self_ref: Weak<Self>,
}

impl FontActivityMonitor {
    pub fn new(fonts: &Arc<FontManager>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            fonts: Arc::downgrade(fonts),
            notifications: fonts.notifications().clone(),
            clock,
            last_activity: Mutex::new(None),
            self_ref: self_ref.clone(),
        })
    }

    /// True between `start_observing` and `stop_observing`.
    pub fn is_observing(&self) -> bool {
        lock(&self.last_activity).is_some()
    }

    /// Marks font activity now.
    pub fn record_activity(&self) {
        let mut last = lock(&self.last_activity);
        if last.is_some() {
            *last = Some(self.clock.now());
        }
    }

    fn observe_font(&self, font: &FontHandle) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let subject = ObjectRef::new(font);
        if self
            .notifications
            .has_subscription(&this, FONT_CHANGED, Some(&subject))
        {
            return;
        }
        self.notifications
            .subscribe(&this, FONT_CHANGED, Some(&subject), |monitor: &Self, _| {
                trace!("✏️ Font activity");
                monitor.record_activity();
                Ok(())
            });
    }

    fn forget_font(&self, font: &FontHandle) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let subject = ObjectRef::new(font);
        if let Err(e) = self
            .notifications
            .unsubscribe(&this, FONT_CHANGED, Some(&subject))
        {
            debug!("Font was not being watched: {}", e);
        }
    }

    fn font_opened(&self, notification: &Notification) -> Result<(), EventError> {
        if let Some(event) = notification.data::<FontEvent>() {
            self.observe_font(&event.font);
        }
        Ok(())
    }

    fn font_closing(&self, notification: &Notification) -> Result<(), EventError> {
        if let Some(event) = notification.data::<FontEvent>() {
            self.forget_font(&event.font);
        }
        Ok(())
    }
}

impl FontActivitySource for FontActivityMonitor {
    fn font_idle_time(&self) -> IdleSample {
        let now = self.clock.now();
        match *lock(&self.last_activity) {
            Some(last) => IdleSample {
                seconds: now - last,
                ended_at: last,
            },
            None => IdleSample {
                seconds: 0.0,
                ended_at: now,
            },
        }
    }

    fn start_observing(&self) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        {
            let mut last = lock(&self.last_activity);
            if last.is_some() {
                return;
            }
            *last = Some(self.clock.now());
        }

        self.notifications
            .subscribe(&this, FONT_DID_OPEN, None, Self::font_opened);
        self.notifications
            .subscribe(&this, FONT_WILL_CLOSE, None, Self::font_closing);
        if let Some(fonts) = self.fonts.upgrade() {
            for font in fonts.all_fonts() {
                self.observe_font(&font);
            }
        }
        debug!("👀 Font activity monitor started");
    }

    fn stop_observing(&self) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        *lock(&self.last_activity) = None;
        self.notifications.unsubscribe_observer(&this);
        debug!("👀 Font activity monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ManualClock;
    use crate::fonts::{Font, FontInfo, InMemoryHost};

    fn setup() -> (Arc<ManualClock>, Arc<InMemoryHost>, Arc<FontManager>, Arc<FontActivityMonitor>) {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let host = Arc::new(InMemoryHost::new());
        let manager = FontManager::new(host.clone(), Arc::new(NotificationBus::new()));
        let monitor = FontActivityMonitor::new(&manager, clock.clone());
        (clock, host, manager, monitor)
    }

    #[test]
    fn test_idle_time_when_not_observing() {
        let (_clock, _host, _manager, monitor) = setup();
        assert_eq!(
            monitor.font_idle_time(),
            IdleSample {
                seconds: 0.0,
                ended_at: 1_000.0
            }
        );
    }

    #[test]
    fn test_changes_reset_idle_time() {
        let (clock, host, manager, monitor) = setup();
        let existing = Font::new(FontInfo::new("A", "Regular"), true);
        host.open_font(&existing);
        manager.font_did_open(&existing);

        monitor.start_observing();
        assert!(monitor.is_observing());
        clock.advance(5.0);
        assert_eq!(monitor.font_idle_time().seconds, 5.0);

        manager.font_did_change(&existing);
        assert_eq!(monitor.font_idle_time().ended_at, 1_005.0);

        // Fonts opened while observing are watched too.
        let later = Font::new(FontInfo::new("B", "Regular"), false);
        host.open_font(&later);
        manager.font_did_open(&later);
        clock.advance(3.0);
        manager.font_did_change(&later);
        assert_eq!(monitor.font_idle_time().ended_at, 1_008.0);
        assert_eq!(monitor.font_idle_time().seconds, 0.0);
    }

    #[test]
    fn test_stop_observing_releases_subscriptions() {
        let (_clock, host, manager, monitor) = setup();
        let font = Font::new(FontInfo::new("A", "Regular"), true);
        host.open_font(&font);
        manager.font_did_open(&font);

        monitor.start_observing();
        assert_eq!(manager.notifications().subscription_count(), 3);

        manager.font_will_close(&font);
        assert_eq!(manager.notifications().subscription_count(), 2);

        monitor.stop_observing();
        assert!(!monitor.is_observing());
        assert_eq!(manager.notifications().subscription_count(), 0);
    }
}
