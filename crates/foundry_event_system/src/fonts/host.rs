//! The host application as seen by the fabric.

use super::font::{FontHandle, FontId};
use crate::utils::lock;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Queries the fabric makes of the host application.
///
/// Edge events (fonts opening and closing, the app resigning active) flow
/// the other way: the host integration calls into
/// [`FontManager`](super::FontManager) and
/// [`ActivityPoller`](crate::ActivityPoller).
pub trait HostEnvironment: Send + Sync + Debug {
    /// True while the application is frontmost.
    fn app_is_active(&self) -> bool;

    /// Open fonts that have a visible interface.
    fn visible_fonts(&self) -> Vec<FontHandle>;

    /// The font the user is working on, if any.
    fn current_font(&self) -> Option<FontHandle>;
}

/// A host that keeps its state in memory.
///
/// Used by the headless binary and by tests.
#[derive(Debug)]
pub struct InMemoryHost {
    active: AtomicBool,
    fonts: Mutex<Vec<FontHandle>>,
    current: Mutex<Option<FontId>>,
}

impl InMemoryHost {
    /// Creates an active host with no open fonts.
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            fonts: Mutex::new(Vec::new()),
            current: Mutex::new(None),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Records `font` as open. The first font opened becomes current.
    pub fn open_font(&self, font: &FontHandle) {
        let mut fonts = lock(&self.fonts);
        if !fonts.iter().any(|open| open.id() == font.id()) {
            fonts.push(font.clone());
        }
        let mut current = lock(&self.current);
        if current.is_none() {
            *current = Some(font.id());
        }
    }

    /// Forgets `font`. Returns whether it was open.
    pub fn close_font(&self, font: &FontHandle) -> bool {
        let mut fonts = lock(&self.fonts);
        let before = fonts.len();
        fonts.retain(|open| open.id() != font.id());
        let mut current = lock(&self.current);
        if *current == Some(font.id()) {
            *current = fonts.first().map(|font| font.id());
        }
        fonts.len() != before
    }

    /// Makes `font` current. Ignored if it is not open.
    pub fn set_current_font(&self, font: &FontHandle) {
        if lock(&self.fonts).iter().any(|open| open.id() == font.id()) {
            *lock(&self.current) = Some(font.id());
        }
    }

    /// Every open font, with or without an interface.
    pub fn open_fonts(&self) -> Vec<FontHandle> {
        lock(&self.fonts).clone()
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEnvironment for InMemoryHost {
    fn app_is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn visible_fonts(&self) -> Vec<FontHandle> {
        lock(&self.fonts)
            .iter()
            .filter(|font| font.has_interface())
            .cloned()
            .collect()
    }

    fn current_font(&self) -> Option<FontHandle> {
        let current = (*lock(&self.current))?;
        lock(&self.fonts)
            .iter()
            .find(|font| font.id() == current)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{Font, FontInfo};

    #[test]
    fn test_visible_fonts_exclude_hidden() {
        let host = InMemoryHost::new();
        let visible = Font::new(FontInfo::new("A", "Regular"), true);
        let hidden = Font::new(FontInfo::new("B", "Regular"), false);
        host.open_font(&visible);
        host.open_font(&hidden);
        host.open_font(&visible);

        assert_eq!(host.open_fonts().len(), 2);
        let ids: Vec<FontId> = host.visible_fonts().iter().map(|font| font.id()).collect();
        assert_eq!(ids, vec![visible.id()]);
    }

    #[test]
    fn test_current_font_follows_open_and_close() {
        let host = InMemoryHost::new();
        assert!(host.current_font().is_none());

        let first = Font::new(FontInfo::new("A", "Regular"), true);
        let second = Font::new(FontInfo::new("B", "Regular"), true);
        host.open_font(&first);
        host.open_font(&second);
        assert_eq!(host.current_font().map(|font| font.id()), Some(first.id()));

        host.set_current_font(&second);
        assert_eq!(host.current_font().map(|font| font.id()), Some(second.id()));

        assert!(host.close_font(&second));
        assert!(!host.close_font(&second));
        assert_eq!(host.current_font().map(|font| font.id()), Some(first.id()));
    }

    #[test]
    fn test_active_flag() {
        let host = InMemoryHost::new();
        assert!(host.app_is_active());
        host.set_active(false);
        assert!(!host.app_is_active());
    }
}
