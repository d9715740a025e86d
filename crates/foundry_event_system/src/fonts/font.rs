//! Font handles and their ephemeral side-table.

use crate::types::{uuid_id, Payload};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Family name used when a font has none.
pub const UNTITLED_FAMILY: &str = "Untitled Family";
/// Style name used when a font has none.
pub const UNTITLED_STYLE: &str = "Untitled Style";
/// Name used when a font has neither family nor style.
pub const UNTITLED_FONT: &str = "Untitled Font";

const UNIQUE_NAME_KEY: &str = "foundry.unique_name";

uuid_id!(
    /// Identity of an open font document.
    FontId
);

/// Shared handle to an open font.
pub type FontHandle = Arc<Font>;

/// Naming metadata of a font.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontInfo {
    pub family_name: Option<String>,
    pub style_name: Option<String>,
}

impl FontInfo {
    pub fn new(family_name: impl Into<String>, style_name: impl Into<String>) -> Self {
        Self {
            family_name: Some(family_name.into()),
            style_name: Some(style_name.into()),
        }
    }

    /// `"{family}-{style}"` with untitled fallbacks.
    pub fn base_name(&self) -> String {
        let family = self.family_name.as_deref().unwrap_or(UNTITLED_FAMILY);
        let style = self.style_name.as_deref().unwrap_or(UNTITLED_STYLE);
        if family == UNTITLED_FAMILY && style == UNTITLED_STYLE {
            return UNTITLED_FONT.to_string();
        }
        format!("{}-{}", family, style)
    }
}

/// Per-font values that live only as long as the font stays open.
///
/// Extensions use it to hang cached state off a font without persisting
/// anything into the document.
#[derive(Default)]
pub struct TempData {
    values: DashMap<String, Payload>,
}

impl TempData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&self, key: &str, value: T) {
        self.values.insert(key.to_string(), Arc::new(value));
    }

    /// Returns a clone of the value under `key` if it is a `T`.
    pub fn get<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    /// Like [`TempData::get`] with a fallback.
    pub fn get_or<T: Any + Send + Sync + Clone>(&self, key: &str, fallback: T) -> T {
        self.get(key).unwrap_or(fallback)
    }

    /// Removes `key`. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&self) {
        self.values.clear();
    }
}

impl fmt::Debug for TempData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.values.iter().map(|entry| entry.key().clone()).collect();
        f.debug_struct("TempData").field("keys", &keys).finish()
    }
}

/// An open font document as seen by extensions.
pub struct Font {
    id: FontId,
    path: Option<PathBuf>,
    info: RwLock<FontInfo>,
    has_interface: AtomicBool,
    temp_data: TempData,
}

impl Font {
    /// Creates an unsaved font.
    pub fn new(info: FontInfo, has_interface: bool) -> FontHandle {
        Arc::new(Self {
            id: FontId::new(),
            path: None,
            info: RwLock::new(info),
            has_interface: AtomicBool::new(has_interface),
            temp_data: TempData::new(),
        })
    }

    /// Creates a font backed by the document at `path`.
    pub fn open(path: impl Into<PathBuf>, info: FontInfo, has_interface: bool) -> FontHandle {
        Arc::new(Self {
            id: FontId::new(),
            path: Some(path.into()),
            info: RwLock::new(info),
            has_interface: AtomicBool::new(has_interface),
            temp_data: TempData::new(),
        })
    }

    pub fn id(&self) -> FontId {
        self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self) -> FontInfo {
        self.info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_info(&self, info: FontInfo) {
        *self.info.write().unwrap_or_else(PoisonError::into_inner) = info;
    }

    /// True if the font has a visible window.
    pub fn has_interface(&self) -> bool {
        self.has_interface.load(Ordering::SeqCst)
    }

    pub fn set_has_interface(&self, has_interface: bool) {
        self.has_interface.store(has_interface, Ordering::SeqCst);
    }

    pub fn temp_data(&self) -> &TempData {
        &self.temp_data
    }

    /// Cached display name, once [`Font::make_unique_name`] has run.
    pub fn unique_name(&self) -> Option<String> {
        self.temp_data.get::<String>(UNIQUE_NAME_KEY)
    }

    /// Assigns and caches a display name that no other font in `others`
    /// already carries.
    ///
    /// The base name is `"{family}-{style}"`; on collision `" 1"`, `" 2"`,
    /// and so on are appended until the name is free. The name is advisory
    /// and not stable across reopening.
    pub fn make_unique_name(&self, others: &[FontHandle]) -> String {
        let existing: Vec<String> = others
            .iter()
            .filter(|other| other.id != self.id)
            .filter_map(|other| other.unique_name())
            .collect();

        let base = self.info().base_name();
        let mut name = base.clone();
        let mut increment = 1;
        while existing.contains(&name) {
            name = format!("{} {}", base, increment);
            increment += 1;
        }

        self.temp_data.set(UNIQUE_NAME_KEY, name.clone());
        name
    }

    /// True if both handles refer to the same document.
    pub fn is_same_document(&self, other: &Font) -> bool {
        if self.id == other.id {
            return true;
        }
        match (&self.path, &other.path) {
            (Some(mine), Some(theirs)) => !mine.as_os_str().is_empty() && mine == theirs,
            _ => false,
        }
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("info", &self.info())
            .field("has_interface", &self.has_interface())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_names_are_disambiguated() {
        let first = Font::new(FontInfo::new("A", "Regular"), true);
        let second = Font::new(FontInfo::new("A", "Regular"), true);
        let fonts = vec![first.clone(), second.clone()];

        assert_eq!(first.make_unique_name(&fonts), "A-Regular");
        assert_eq!(second.make_unique_name(&fonts), "A-Regular 1");
        assert_eq!(second.unique_name().as_deref(), Some("A-Regular 1"));
    }

    #[test]
    fn test_untitled_names() {
        let untitled = Font::new(FontInfo::default(), false);
        assert_eq!(untitled.make_unique_name(&[]), "Untitled Font");

        let family_only = FontInfo {
            family_name: Some("Sans".to_string()),
            style_name: None,
        };
        assert_eq!(family_only.base_name(), "Sans-Untitled Style");
    }

    #[test]
    fn test_unique_name_skips_taken_suffixes() {
        let fonts: Vec<FontHandle> = (0..3)
            .map(|_| Font::new(FontInfo::new("B", "Bold"), true))
            .collect();
        for font in &fonts {
            font.make_unique_name(&fonts);
        }
        let names: Vec<String> = fonts.iter().filter_map(|font| font.unique_name()).collect();
        assert_eq!(names, vec!["B-Bold", "B-Bold 1", "B-Bold 2"]);

        // Renaming an existing font keeps its own name available to it.
        assert_eq!(fonts[1].make_unique_name(&fonts), "B-Bold 1");
    }

    #[test]
    fn test_same_document() {
        let first = Font::open("/fonts/a.ufo", FontInfo::default(), true);
        let second = Font::open("/fonts/a.ufo", FontInfo::default(), false);
        let other = Font::open("/fonts/b.ufo", FontInfo::default(), false);
        let unsaved = Font::new(FontInfo::default(), true);

        assert!(first.is_same_document(&second));
        assert!(!first.is_same_document(&other));
        assert!(unsaved.is_same_document(&unsaved));
        assert!(!unsaved.is_same_document(&first));
    }

    #[test]
    fn test_temp_data() {
        let font = Font::new(FontInfo::default(), true);
        let data = font.temp_data();
        assert!(data.is_empty());

        data.set("metrics.cached", 42u32);
        assert_eq!(data.get::<u32>("metrics.cached"), Some(42));
        assert_eq!(data.get::<String>("metrics.cached"), None);
        assert_eq!(data.get_or("missing", 7u32), 7);
        assert!(data.contains("metrics.cached"));

        assert!(data.remove("metrics.cached"));
        assert!(!data.remove("metrics.cached"));
        assert_eq!(data.len(), 0);
    }
}
