//! # Foundry Event System
//!
//! The shared fabric that lets independently written font-editor extensions
//! observe one another and the host without holding references to each
//! other.
//!
//! ## Core Features
//!
//! - **Weak Observation**: Observers, subjects and responders are held
//!   weakly; dropping an object silently retires its registrations
//! - **Subject Scoping**: Notifications can target one object or everyone
//! - **Request/Response**: Named requests answered by exactly one responder
//!   per domain
//! - **Activity Polling**: Periodic checks for user and font-editing
//!   inactivity with per-observer thresholds
//! - **Font Tracking**: Every open font, including those without a window
//!
//! ## Architecture Overview
//!
//! Host lifecycle edges (font opened or closed, application activated or
//! resigned) enter through [`FontManager`] and [`ActivityPoller`]. Both
//! publish onto the [`NotificationBus`]. Extensions, usually through an
//! [`ExtensionController`], subscribe to those notifications, register
//! activity observers, and expose operations on the [`RequestBus`].
//!
//! All dispatch is synchronous on the caller's thread. Callbacks may
//! register, unregister and publish reentrantly.
//!
//! ## Quick Start Example
//!
//! ```rust
//! use foundry_event_system::*;
//! use std::sync::Arc;
//!
//! struct Palette;
//!
//! let host = Arc::new(InMemoryHost::new());
//! let context = create_foundry_context(host.clone());
//!
//! let palette = Arc::new(Palette);
//! context.notifications().subscribe(
//!     &palette,
//!     FONT_DID_OPEN,
//!     None,
//!     |_: &Palette, notification: &Notification| {
//!         if let Some(event) = notification.data::<FontEvent>() {
//!             println!("opened {}", event.font.info().base_name());
//!         }
//!         Ok(())
//!     },
//! );
//!
//! let font = Font::new(FontInfo::new("Sans", "Regular"), true);
//! host.open_font(&font);
//! context.fonts().font_did_open(&font);
//! ```

pub mod activity;
pub mod config;
pub mod context;
pub mod controller;
pub mod defaults;
pub mod error;
pub mod fonts;
pub mod notifications;
pub mod requests;
pub mod types;
pub mod utils;


pub use activity::*;
pub use config::{ActivityConfig, FoundryConfig};
pub use context::{FoundryContext, FoundryContextBuilder, ShutdownSummary};
pub use controller::{ExtensionController, RELAYED_EVENTS};
pub use defaults::{InMemoryPreferenceStore, OwnerDefaults, PreferenceStore};
pub use error::{EventError, IdleTimeError};
pub use fonts::*;
pub use notifications::{Notification, NotificationBus, NotificationStats};
pub use requests::{RequestBus, ResponderChange, RESPONDER_ADDED, RESPONDER_REMOVED};
pub use types::{ActivityObserverId, ObjectKey, ObjectRef, Payload, SubscriptionId};
pub use utils::{create_foundry_context, current_time, round_to_hundredths};
