//! The aggregation point for open fonts.

use super::font::{FontHandle, FontId};
use super::host::HostEnvironment;
use crate::notifications::NotificationBus;
use crate::types::{ObjectKey, ObjectRef};
use crate::utils::lock;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info};

/// A font became open. Payload: [`FontEvent`].
pub const FONT_DID_OPEN: &str = "fonts:did_open";
/// A font is about to close. Payload: [`FontEvent`].
pub const FONT_WILL_CLOSE: &str = "fonts:will_close";
/// A font finished closing. No payload.
pub const FONT_DID_CLOSE: &str = "fonts:did_close";
/// The set of open fonts changed. Payload: [`AvailableFontsEvent`].
pub const AVAILABLE_FONTS_CHANGED: &str = "fonts:available_changed";
/// A font's content changed. Posted with the font as subject.
pub const FONT_CHANGED: &str = "font:changed";

/// Payload of [`FONT_DID_OPEN`] and [`FONT_WILL_CLOSE`].
#[derive(Debug, Clone)]
pub struct FontEvent {
    pub font: FontHandle,
}

/// Payload of [`AVAILABLE_FONTS_CHANGED`].
#[derive(Debug, Clone)]
pub struct AvailableFontsEvent {
    pub fonts: Vec<FontHandle>,
}

#[derive(Debug, Default)]
struct ManagerState {
    /// Open fonts the host does not enumerate because they have no window.
    no_interface: Vec<FontHandle>,
    /// Font whose visibility toggle is in flight.
    changing_visibility: Option<FontId>,
}

/// Tracks every open font, including those without an interface, and
/// announces open/close changes on the [`NotificationBus`].
///
/// The host integration calls the `font_*` edge methods. Hiding or showing a
/// font's window makes most hosts emit a close followed by an open; bracket
/// the toggle with [`FontManager::font_will_change_visibility`] and
/// [`FontManager::font_did_change_visibility`] and those edges are ignored.
///
/// Every notification is posted with the manager as subject.
#[derive(Debug)]
pub struct FontManager {
    host: Arc<dyn HostEnvironment>,
    notifications: Arc<NotificationBus>,
    state: Mutex<ManagerState>,
    subject: ObjectRef,
}

impl FontManager {
    pub fn new(host: Arc<dyn HostEnvironment>, notifications: Arc<NotificationBus>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| Self {
            host,
            notifications,
            state: Mutex::new(ManagerState::default()),
            subject: ObjectRef::from_weak(weak),
        })
    }

    /// Reference to this manager, for subject-scoped subscriptions.
    pub fn subject(&self) -> &ObjectRef {
        &self.subject
    }

    pub fn notifications(&self) -> &Arc<NotificationBus> {
        &self.notifications
    }

    // ========================================================================
    // Host edges
    // ========================================================================

    /// A font became open, with or without an interface.
    ///
    /// Posts [`FONT_DID_OPEN`] then [`AVAILABLE_FONTS_CHANGED`].
    pub fn font_did_open(&self, font: &FontHandle) {
        {
            let mut state = lock(&self.state);
            if state.changing_visibility == Some(font.id()) {
                debug!("🙈 Ignoring open of {} during visibility change", font.id());
                return;
            }
            if font.has_interface() {
                remove_document(&mut state.no_interface, font);
            } else if !contains_document(&state.no_interface, font) {
                state.no_interface.push(font.clone());
            }
        }

        info!("📂 Font opened: {}", font.info().base_name());
        self.post(FONT_DID_OPEN, FontEvent { font: font.clone() });
        self.post_available_fonts();
    }

    /// A font is about to close.
    ///
    /// Posts [`FONT_WILL_CLOSE`], then drops every subscription scoped to
    /// the font.
    pub fn font_will_close(&self, font: &FontHandle) {
        {
            let mut state = lock(&self.state);
            if state.changing_visibility == Some(font.id()) {
                debug!("🙈 Ignoring close of {} during visibility change", font.id());
                return;
            }
            remove_document(&mut state.no_interface, font);
        }

        info!("📁 Font closing: {}", font.info().base_name());
        self.post(FONT_WILL_CLOSE, FontEvent { font: font.clone() });
        self.notifications.purge_subject(ObjectKey::of(font));
    }

    /// A font finished closing.
    ///
    /// Posts [`FONT_DID_CLOSE`] then [`AVAILABLE_FONTS_CHANGED`].
    pub fn font_did_close(&self) {
        if lock(&self.state).changing_visibility.is_some() {
            debug!("🙈 Ignoring did-close during visibility change");
            return;
        }
        self.notifications
            .publish(FONT_DID_CLOSE, Some(&self.subject), None);
        self.post_available_fonts();
    }

    /// Starts a visibility toggle for `font`.
    pub fn font_will_change_visibility(&self, font: &FontHandle) {
        lock(&self.state).changing_visibility = Some(font.id());
    }

    /// Ends a visibility toggle for `font`.
    ///
    /// The font moves into or out of the no-interface set according to its
    /// new interface state. Nothing is posted.
    pub fn font_did_change_visibility(&self, font: &FontHandle) {
        let mut state = lock(&self.state);
        if font.has_interface() {
            remove_document(&mut state.no_interface, font);
        } else if !contains_document(&state.no_interface, font) {
            state.no_interface.push(font.clone());
        }
        if state.changing_visibility == Some(font.id()) {
            state.changing_visibility = None;
        } else {
            debug!("🙈 Visibility change of {} was not bracketed", font.id());
        }
    }

    /// Posts [`FONT_CHANGED`] with `font` as subject.
    pub fn font_did_change(&self, font: &FontHandle) {
        self.notifications
            .publish(FONT_CHANGED, Some(&ObjectRef::new(font)), None);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Host-visible fonts followed by no-interface fonts, each document once.
    pub fn all_fonts(&self) -> Vec<FontHandle> {
        let mut fonts = self.host.visible_fonts();
        let hidden = lock(&self.state).no_interface.clone();
        for font in hidden {
            if !contains_document(&fonts, &font) {
                fonts.push(font);
            }
        }
        fonts
    }

    pub fn current_font(&self) -> Option<FontHandle> {
        self.host.current_font()
    }

    /// True if `font` is tracked because it has no interface.
    pub fn is_tracked_without_interface(&self, font: &FontHandle) -> bool {
        contains_document(&lock(&self.state).no_interface, font)
    }

    /// True while a visibility toggle is bracketed.
    pub fn is_changing_visibility(&self) -> bool {
        lock(&self.state).changing_visibility.is_some()
    }

    fn post<T: Send + Sync + 'static>(&self, event: &str, payload: T) {
        self.notifications
            .publish(event, Some(&self.subject), Some(Arc::new(payload)));
    }

    fn post_available_fonts(&self) {
        let fonts = self.all_fonts();
        self.post(AVAILABLE_FONTS_CHANGED, AvailableFontsEvent { fonts });
    }
}

fn contains_document(fonts: &[FontHandle], font: &FontHandle) -> bool {
    fonts.iter().any(|other| other.is_same_document(font))
}

fn remove_document(fonts: &mut Vec<FontHandle>, font: &FontHandle) {
    if let Some(position) = fonts.iter().position(|other| other.is_same_document(font)) {
        fonts.remove(position);
    }
}
