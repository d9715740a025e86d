//! # Fonts
//!
//! Open-font tracking and the font handle extensions work with.
//!
//! ## Key Components
//!
//! - [`FontManager`] - Tracks open fonts and posts open/close notifications
//! - [`Font`] / [`FontHandle`] - An open document with its [`TempData`]
//! - [`HostEnvironment`] - What the fabric asks of the host application
//! - [`InMemoryHost`] - Host used headless and in tests

mod font;
mod host;
mod manager;

pub use font::{
    Font, FontHandle, FontId, FontInfo, TempData, UNTITLED_FAMILY, UNTITLED_FONT, UNTITLED_STYLE,
};
pub use host::{HostEnvironment, InMemoryHost};
pub use manager::{
    AvailableFontsEvent, FontEvent, FontManager, AVAILABLE_FONTS_CHANGED, FONT_CHANGED,
    FONT_DID_CLOSE, FONT_DID_OPEN, FONT_WILL_CLOSE,
};
