//! Demo extension that logs font lifecycle and inactivity periods.
//!
//! It exercises every part of the fabric: it observes font notifications
//! through its controller, registers an activity observer, and answers the
//! `activity_logger.summary` request so other extensions can query it.

use foundry_event_system::{
    ActivityObserverId, ActivityObserverOptions, AvailableFontsEvent, EventError,
    ExtensionController, FontEvent, FoundryContext, Notification, PollSample,
    AVAILABLE_FONTS_CHANGED, FONT_DID_OPEN, FONT_WILL_CLOSE,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Request answered with a [`LoggerSummary`].
pub const SUMMARY_REQUEST: &str = "activity_logger.summary";

/// What the logger has seen so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggerSummary {
    pub fonts_opened: u64,
    pub fonts_closed: u64,
    pub open_fonts: Vec<String>,
    pub inactivity_reports: u64,
    pub last_report: Option<PollSample>,
}

#[derive(Debug)]
pub struct ActivityLogger {
    controller: Arc<ExtensionController>,
    summary: Mutex<LoggerSummary>,
    observer: Mutex<Option<ActivityObserverId>>,
}

impl ActivityLogger {
    /// Creates the logger and wires it into `context`.
    pub fn install(
        context: Arc<FoundryContext>,
        identifier: &str,
        options: ActivityObserverOptions,
    ) -> Result<Arc<Self>, EventError> {
        let controller = ExtensionController::new(identifier, context);
        let logger = Arc::new(Self {
            controller: controller.clone(),
            summary: Mutex::new(LoggerSummary::default()),
            observer: Mutex::new(None),
        });

        controller.start();
        controller.add_font_manager_observer(&logger, FONT_DID_OPEN, Self::font_did_open);
        controller.add_font_manager_observer(&logger, FONT_WILL_CLOSE, Self::font_will_close);
        controller.add_font_manager_observer(
            &logger,
            AVAILABLE_FONTS_CHANGED,
            Self::available_fonts_changed,
        );
        controller.add_responder(&logger, SUMMARY_REQUEST, None, |logger: &Self, _: ()| {
            logger.summary()
        })?;

        let id = controller.add_activity_observer(&logger, options, Self::inactivity);
        *logger
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);

        info!("🔌 Activity logger installed as '{}' ({:?})", identifier, options);
        Ok(logger)
    }

    pub fn controller(&self) -> &Arc<ExtensionController> {
        &self.controller
    }

    pub fn summary(&self) -> LoggerSummary {
        self.summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Unhooks the logger from the fabric.
    pub fn uninstall(self: &Arc<Self>) {
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = observer {
            if let Err(e) = self.controller.remove_activity_observer(id) {
                warn!("⚠️ Activity observer already gone: {}", e);
            }
        }
        if let Err(e) = self.controller.remove_responder(SUMMARY_REQUEST, None) {
            warn!("⚠️ Summary responder already gone: {}", e);
        }
        self.controller
            .context()
            .notifications()
            .unsubscribe_observer(self);
        self.controller.stop();
        info!("🔌 Activity logger uninstalled");
    }

    fn update(&self, change: impl FnOnce(&mut LoggerSummary)) {
        change(&mut self.summary.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn font_did_open(&self, notification: &Notification) -> Result<(), EventError> {
        let event = notification
            .data::<FontEvent>()
            .ok_or_else(|| EventError::HandlerExecution("font event without payload".into()))?;
        info!("📂 Font opened: {}", event.font.info().base_name());
        self.update(|summary| summary.fonts_opened += 1);
        Ok(())
    }

    fn font_will_close(&self, notification: &Notification) -> Result<(), EventError> {
        let event = notification
            .data::<FontEvent>()
            .ok_or_else(|| EventError::HandlerExecution("font event without payload".into()))?;
        let name = event
            .font
            .unique_name()
            .unwrap_or_else(|| event.font.info().base_name());
        info!("📁 Font closing: {}", name);
        self.update(|summary| summary.fonts_closed += 1);
        Ok(())
    }

    fn available_fonts_changed(&self, notification: &Notification) -> Result<(), EventError> {
        let Some(event) = notification.data::<AvailableFontsEvent>() else {
            return Ok(());
        };
        let names: Vec<String> = event
            .fonts
            .iter()
            .filter_map(|font| font.unique_name())
            .collect();
        info!("🗂️ {} font(s) open: {}", names.len(), names.join(", "));
        self.update(|summary| summary.open_fonts = names);
        Ok(())
    }

    fn inactivity(&self, sample: &PollSample) -> Result<(), EventError> {
        let user = sample
            .since_user_activity
            .map(|seconds| format!("{:.1}s", seconds))
            .unwrap_or_else(|| "unknown".to_string());
        info!(
            "💤 Inactive: user {}, fonts {:.1}s (app {})",
            user,
            sample.since_font_activity,
            if sample.app_is_active { "active" } else { "inactive" }
        );
        self.update(|summary| {
            summary.inactivity_reports += 1;
            summary.last_report = Some(*sample);
        });
        Ok(())
    }
}
