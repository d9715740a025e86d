//! # Extension Controller
//!
//! Per-extension convenience layer over the shared [`FoundryContext`].
//!
//! ## Key Components
//!
//! - [`ExtensionController`] - Identifier, namespaced defaults and helpers
//!   for every bus
//!
//! A started controller relays the font manager's notifications with itself
//! as subject, so an extension can observe font lifecycle events scoped to
//! its own controller instead of the process-wide manager.

use crate::activity::{ActivityObserverOptions, PollSample};
use crate::context::FoundryContext;
use crate::defaults::OwnerDefaults;
use crate::error::EventError;
use crate::fonts::{
    AvailableFontsEvent, FontHandle, AVAILABLE_FONTS_CHANGED, FONT_DID_CLOSE, FONT_DID_OPEN,
    FONT_WILL_CLOSE,
};
use crate::notifications::Notification;
use crate::types::{ActivityObserverId, ObjectRef, Payload, SubscriptionId};
use crate::utils::lock;
use std::any::Any;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info};

/// Font manager events a started controller re-posts under its own subject.
pub const RELAYED_EVENTS: [&str; 4] = [
    FONT_DID_OPEN,
    FONT_WILL_CLOSE,
    FONT_DID_CLOSE,
    AVAILABLE_FONTS_CHANGED,
];

/// One extension's handle on the fabric.
#[derive(Debug)]
pub struct ExtensionController {
    identifier: String,
    context: Arc<FoundryContext>,
    defaults: OwnerDefaults,
    subject: ObjectRef,
    relays: Mutex<Vec<SubscriptionId>>,
    self_ref: Weak<Self>,
}

impl ExtensionController {
    /// Creates a stopped controller. Its defaults live under `identifier`.
    pub fn new(identifier: impl Into<String>, context: Arc<FoundryContext>) -> Arc<Self> {
        let identifier = identifier.into();
        let defaults = context.defaults_for(&identifier);
        Arc::new_cyclic(|self_ref: &Weak<Self>| Self {
            identifier,
            context,
            defaults,
            subject: ObjectRef::from_weak(self_ref),
            relays: Mutex::new(Vec::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn context(&self) -> &Arc<FoundryContext> {
        &self.context
    }

    pub fn defaults(&self) -> &OwnerDefaults {
        &self.defaults
    }

    /// Subject of every notification this controller posts.
    pub fn subject(&self) -> &ObjectRef {
        &self.subject
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts relaying font manager notifications. No-op if started.
    pub fn start(&self) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let mut relays = lock(&self.relays);
        if !relays.is_empty() {
            return;
        }

        let fonts = self.context.fonts();
        for event in RELAYED_EVENTS {
            let id = self.context.notifications().subscribe(
                &this,
                event,
                Some(fonts.subject()),
                |controller: &Self, notification: &Notification| {
                    controller.relay(notification);
                    Ok(())
                },
            );
            relays.push(id);
        }
        info!("🚀 Extension '{}' started", self.identifier);
    }

    /// Stops relaying. No-op if stopped.
    pub fn stop(&self) {
        let relays: Vec<SubscriptionId> = lock(&self.relays).drain(..).collect();
        if relays.is_empty() {
            return;
        }
        for id in relays {
            if let Err(e) = self.context.notifications().unsubscribe_id(id) {
                debug!("Relay already removed: {}", e);
            }
        }
        info!("🛑 Extension '{}' stopped", self.identifier);
    }

    pub fn is_started(&self) -> bool {
        !lock(&self.relays).is_empty()
    }

    fn relay(&self, notification: &Notification) {
        if notification.name() == AVAILABLE_FONTS_CHANGED {
            let fonts = self.all_fonts();
            self.post_notification(
                AVAILABLE_FONTS_CHANGED,
                Some(Arc::new(AvailableFontsEvent { fonts })),
            );
            return;
        }
        self.post_notification(notification.name(), notification.payload());
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Publishes `event` with this controller as subject.
    pub fn post_notification(&self, event: &str, data: Option<Payload>) -> usize {
        self.context
            .notifications()
            .publish(event, Some(&self.subject), data)
    }

    /// Subscribes `observer` to `event` as relayed by this controller.
    pub fn add_font_manager_observer<O, F>(
        &self,
        observer: &Arc<O>,
        event: &str,
        method: F,
    ) -> SubscriptionId
    where
        O: Any + Send + Sync,
        F: Fn(&O, &Notification) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.context
            .notifications()
            .subscribe(observer, event, Some(&self.subject), method)
    }

    pub fn remove_font_manager_observer<O: ?Sized>(
        &self,
        observer: &Arc<O>,
        event: &str,
    ) -> Result<usize, EventError> {
        self.context
            .notifications()
            .unsubscribe(observer, event, Some(&self.subject))
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Registers `method` on `responder` as the answer to `request`.
    pub fn add_responder<O, A, R, F>(
        &self,
        responder: &Arc<O>,
        request: &str,
        domain: Option<&ObjectRef>,
        method: F,
    ) -> Result<(), EventError>
    where
        O: Any + Send + Sync,
        A: Any + Send,
        R: Any + Send,
        F: Fn(&O, A) -> R + Send + Sync + 'static,
    {
        self.context
            .requests()
            .register(responder, request, domain, method)
    }

    pub fn remove_responder(
        &self,
        request: &str,
        domain: Option<&ObjectRef>,
    ) -> Result<(), EventError> {
        self.context.requests().unregister(request, domain)
    }

    /// Sends `request` and returns the responder's result, if any.
    pub fn send_request<A, R>(&self, request: &str, domain: Option<&ObjectRef>, args: A) -> Option<R>
    where
        A: Any + Send,
        R: Any + Send,
    {
        self.context.requests().send(request, domain, args)
    }

    // ========================================================================
    // Activity
    // ========================================================================

    pub fn add_activity_observer<O, F>(
        &self,
        observer: &Arc<O>,
        options: ActivityObserverOptions,
        method: F,
    ) -> ActivityObserverId
    where
        O: Any + Send + Sync,
        F: Fn(&O, &PollSample) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.context.activity().add_observer(observer, options, method)
    }

    pub fn remove_activity_observer(&self, id: ActivityObserverId) -> Result<(), EventError> {
        self.context.activity().remove_observer(id)
    }

    // ========================================================================
    // Fonts
    // ========================================================================

    /// Every open font. Fonts without a display name get one first.
    pub fn all_fonts(&self) -> Vec<FontHandle> {
        let fonts = self.context.fonts().all_fonts();
        for font in &fonts {
            if font.unique_name().is_none() {
                font.make_unique_name(&fonts);
            }
        }
        fonts
    }

    pub fn current_font(&self) -> Option<FontHandle> {
        self.context.fonts().current_font()
    }

    /// Subscribes `observer` to `event` posted about `font`.
    ///
    /// An existing registration of `observer` for the same font and event
    /// is replaced.
    pub fn add_font_observer<O, F>(
        &self,
        font: &FontHandle,
        observer: &Arc<O>,
        event: &str,
        method: F,
    ) -> SubscriptionId
    where
        O: Any + Send + Sync,
        F: Fn(&O, &Notification) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let notifications = self.context.notifications();
        let subject = ObjectRef::new(font);
        if notifications.has_subscription(observer, event, Some(&subject)) {
            let _ = notifications.unsubscribe(observer, event, Some(&subject));
        }
        notifications.subscribe(observer, event, Some(&subject), method)
    }

    pub fn remove_font_observer<O: ?Sized>(
        &self,
        font: &FontHandle,
        observer: &Arc<O>,
        event: &str,
    ) -> Result<usize, EventError> {
        self.context
            .notifications()
            .unsubscribe(observer, event, Some(&ObjectRef::new(font)))
    }

    pub fn has_font_observer<O: ?Sized>(
        &self,
        font: &FontHandle,
        observer: &Arc<O>,
        event: &str,
    ) -> bool {
        self.context
            .notifications()
            .has_subscription(observer, event, Some(&ObjectRef::new(font)))
    }
}

impl Drop for ExtensionController {
    fn drop(&mut self) {
        let relays = self
            .relays
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for id in relays.drain(..) {
            let _ = self.context.notifications().unsubscribe_id(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{IdleSample, ManualClock, ManualIdleTimeSource};
    use crate::fonts::{Font, FontEvent, FontInfo, InMemoryHost, FONT_CHANGED};

    #[derive(Default)]
    struct Extension {
        seen: Mutex<Vec<String>>,
    }

    impl Extension {
        fn record(&self, notification: &Notification) -> Result<(), EventError> {
            lock(&self.seen).push(notification.name().to_string());
            Ok(())
        }

        fn seen(&self) -> Vec<String> {
            lock(&self.seen).clone()
        }
    }

    struct Rig {
        clock: Arc<ManualClock>,
        host: Arc<InMemoryHost>,
        idle: Arc<ManualIdleTimeSource>,
        controller: Arc<ExtensionController>,
    }

    fn rig() -> Rig {
        let clock = Arc::new(ManualClock::new(1000.0));
        let host = Arc::new(InMemoryHost::new());
        let idle = Arc::new(ManualIdleTimeSource::new());
        let context = FoundryContext::builder(host.clone())
            .clock(clock.clone())
            .idle_source(idle.clone())
            .build();
        let controller = ExtensionController::new("com.example.booster", context);
        Rig {
            clock,
            host,
            idle,
            controller,
        }
    }

    fn open(rig: &Rig, font: &FontHandle) {
        rig.host.open_font(font);
        rig.controller.context().fonts().font_did_open(font);
    }

    #[test]
    fn test_relays_font_events_while_started() {
        let rig = rig();
        let extension = Arc::new(Extension::default());
        rig.controller
            .add_font_manager_observer(&extension, FONT_DID_OPEN, Extension::record);

        open(&rig, &Font::new(FontInfo::new("A", "Regular"), true));
        assert!(extension.seen().is_empty());

        rig.controller.start();
        assert!(rig.controller.is_started());
        open(&rig, &Font::new(FontInfo::new("B", "Regular"), true));
        assert_eq!(extension.seen(), vec![FONT_DID_OPEN]);

        rig.controller.stop();
        assert!(!rig.controller.is_started());
        open(&rig, &Font::new(FontInfo::new("C", "Regular"), true));
        assert_eq!(extension.seen().len(), 1);
    }

    #[test]
    fn test_relayed_notification_carries_controller_and_payload() {
        let rig = rig();
        let received = Arc::new(Mutex::new(None));
        let probe = Arc::new(received.clone());
        rig.controller.add_font_manager_observer(
            &probe,
            FONT_DID_OPEN,
            |probe: &Arc<Mutex<Option<(bool, String)>>>, notification: &Notification| {
                let from_controller = notification.subject_as::<ExtensionController>().is_some();
                let name = notification
                    .data::<FontEvent>()
                    .map(|event| event.font.info().base_name())
                    .unwrap_or_default();
                *lock(probe) = Some((from_controller, name));
                Ok(())
            },
        );
        rig.controller.start();

        open(&rig, &Font::new(FontInfo::new("Serif", "Bold"), true));
        assert_eq!(
            lock(&received).clone(),
            Some((true, "Serif-Bold".to_string()))
        );
    }

    #[test]
    fn test_available_fonts_relay_assigns_unique_names() {
        let rig = rig();
        let names = Arc::new(Mutex::new(Vec::new()));
        let probe = Arc::new(names.clone());
        rig.controller.add_font_manager_observer(
            &probe,
            AVAILABLE_FONTS_CHANGED,
            |probe: &Arc<Mutex<Vec<String>>>, notification: &Notification| {
                if let Some(event) = notification.data::<AvailableFontsEvent>() {
                    *lock(probe) = event.fonts.iter().filter_map(|font| font.unique_name()).collect();
                }
                Ok(())
            },
        );
        rig.controller.start();

        open(&rig, &Font::new(FontInfo::new("A", "Regular"), true));
        open(&rig, &Font::new(FontInfo::new("A", "Regular"), true));
        assert_eq!(lock(&names).clone(), vec!["A-Regular", "A-Regular 1"]);
    }

    #[test]
    fn test_all_fonts_and_current_font() {
        let rig = rig();
        let visible = Font::new(FontInfo::new("A", "Regular"), true);
        let hidden = Font::new(FontInfo::new("A", "Regular"), false);
        open(&rig, &visible);
        open(&rig, &hidden);

        let fonts = rig.controller.all_fonts();
        assert_eq!(fonts.len(), 2);
        assert_eq!(visible.unique_name().as_deref(), Some("A-Regular"));
        assert_eq!(hidden.unique_name().as_deref(), Some("A-Regular 1"));
        assert!(rig
            .controller
            .current_font()
            .is_some_and(|font| font.is_same_document(&visible)));
    }

    #[test]
    fn test_font_observer_helpers() {
        let rig = rig();
        let font = Font::new(FontInfo::new("A", "Regular"), true);
        open(&rig, &font);
        let extension = Arc::new(Extension::default());

        rig.controller
            .add_font_observer(&font, &extension, FONT_CHANGED, Extension::record);
        rig.controller
            .add_font_observer(&font, &extension, FONT_CHANGED, Extension::record);
        assert!(rig.controller.has_font_observer(&font, &extension, FONT_CHANGED));

        rig.controller.context().fonts().font_did_change(&font);
        assert_eq!(extension.seen(), vec![FONT_CHANGED]);

        assert_eq!(
            rig.controller
                .remove_font_observer(&font, &extension, FONT_CHANGED)
                .unwrap(),
            1
        );
        assert!(!rig.controller.has_font_observer(&font, &extension, FONT_CHANGED));
        assert!(rig
            .controller
            .remove_font_observer(&font, &extension, FONT_CHANGED)
            .is_err());
    }

    #[test]
    fn test_request_helpers() {
        let rig = rig();
        let extension = Arc::new(Extension::default());
        rig.controller
            .add_responder(&extension, "booster.echo", None, |_: &Extension, text: String| {
                text.to_uppercase()
            })
            .unwrap();

        let reply: Option<String> =
            rig.controller
                .send_request("booster.echo", None, "hello".to_string());
        assert_eq!(reply.as_deref(), Some("HELLO"));

        rig.controller.remove_responder("booster.echo", None).unwrap();
        let reply: Option<String> =
            rig.controller
                .send_request("booster.echo", None, "hello".to_string());
        assert!(reply.is_none());
    }

    #[test]
    fn test_activity_helpers() {
        let rig = rig();
        let fired = Arc::new(Mutex::new(0u32));
        let probe = Arc::new(fired.clone());
        rig.idle.set(IdleSample::since(10.0, 1000.0));

        let id = rig.controller.add_activity_observer(
            &probe,
            ActivityObserverOptions::default(),
            |probe: &Arc<Mutex<u32>>, _: &PollSample| {
                *lock(probe) += 1;
                Ok(())
            },
        );
        let activity = rig.controller.context().activity().clone();
        rig.clock.advance(3.0);
        activity.poll_once();
        activity.poll_once();
        assert_eq!(*lock(&fired), 1);

        rig.controller.remove_activity_observer(id).unwrap();
        assert!(!activity.is_polling());
        assert!(rig.controller.remove_activity_observer(id).is_err());
    }

    #[test]
    fn test_defaults_use_identifier() {
        let rig = rig();
        rig.controller.defaults().set("threshold", &5).unwrap();
        assert_eq!(rig.controller.defaults().owner(), "com.example.booster");
        assert!(rig
            .controller
            .context()
            .preferences()
            .get("com.example.booster.threshold")
            .is_some());
    }

    #[test]
    fn test_dropping_controller_removes_relays() {
        let rig = rig();
        let notifications = rig.controller.context().notifications().clone();
        rig.controller.start();
        assert_eq!(notifications.subscription_count(), RELAYED_EVENTS.len());

        drop(rig.controller);
        assert_eq!(notifications.subscription_count(), 0);
    }
}
