//! # Notification Bus
//!
//! Subject-scoped publish/subscribe with weakly held observers.
//!
//! ## Key Components
//!
//! - [`NotificationBus`] - The registration tables and synchronous dispatch
//! - [`Notification`] - Name, subject and payload handed to observers
//! - [`NotificationStats`] - Dispatch counters
//!
//! ## Module Organization
//!
//! - `core` - Bus structure and table types
//! - `handlers` - Subscribe and unsubscribe
//! - `emitters` - Publish and dispatch
//! - `management` - Purging, garbage collection and inspection
//! - `stats` - Statistics type

mod core;
mod emitters;
mod handlers;
mod management;
mod notification;
mod stats;


pub use self::core::NotificationBus;
pub use notification::Notification;
pub use stats::NotificationStats;
