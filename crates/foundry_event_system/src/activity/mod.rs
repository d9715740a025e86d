//! # Activity Polling
//!
//! Best-effort detection of user and font-editing inactivity.
//!
//! ## Key Components
//!
//! - [`ActivityPoller`] - Timer-driven sampling and observer dispatch
//! - [`ActivityObserverOptions`] - Per-observer thresholds and repeat policy
//! - [`PollSample`] - What observers receive on each tick
//! - [`IdleTimeSource`] - User idle time (`ioreg`, unavailable, or host fed)
//! - [`FontActivitySource`] / [`FontActivityMonitor`] - Font idle time
//! - [`Clock`] - Wall-clock abstraction, [`ManualClock`] for replaying ticks
//!
//! ## Matching
//!
//! On each tick an observer fires when the application state matches its
//! requirement, both kinds of inactivity have lasted at least as long as its
//! thresholds, and (unless it asked for repeats) it has not already been
//! told about this inactivity period. A period is identified by the moments
//! user and font activity ended.

mod clock;
mod font_monitor;
mod idle;
mod observer;
mod poller;
mod sample;

pub use clock::{Clock, ManualClock, SystemClock};
pub use font_monitor::{FontActivityMonitor, FontActivitySource};
pub use idle::{
    parse_hid_idle_time, IdleSample, IdleSourceKind, IdleTimeSource, IoregIdleTimeSource,
    ManualIdleTimeSource, UnavailableIdleTimeSource,
};
pub use observer::{ActivityObserverOptions, AppStateRequirement, DEFAULT_INACTIVITY_THRESHOLD};
pub use poller::{ActivityPoller, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use sample::PollSample;
