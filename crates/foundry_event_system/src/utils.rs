//! # Utility Functions
//!
//! Timestamp helpers and the context factory shared across the fabric.
//!
//! ## Key Functions
//!
//! - [`current_time()`] - Wall-clock seconds since the Unix epoch, as `f64`
//! - [`round_to_hundredths()`] - Precision limiter for "ended at" stamps
//! - [`create_foundry_context()`] - Context factory with default collaborators

use crate::context::FoundryContext;
use crate::fonts::HostEnvironment;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ============================================================================
// Utility Functions
// ============================================================================

/// Returns the current Unix time in fractional seconds.
///
/// A clock set before the epoch reports `0.0` rather than panicking.
pub fn current_time() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Rounds to the nearest hundredth of a second.
///
/// "Ended at" stamps are compared for equality between ticks to detect a
/// repeated inactivity period, so they are kept at the precision polling
/// can actually deliver.
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Creates a context with the default idle source, the system clock and an
/// in-memory preference store.
///
/// # Examples
///
/// ```rust
/// use foundry_event_system::*;
/// use std::sync::Arc;
///
/// let host = Arc::new(InMemoryHost::new());
/// let context = create_foundry_context(host);
/// assert_eq!(context.fonts().all_fonts().len(), 0);
/// ```
pub fn create_foundry_context(host: Arc<dyn HostEnvironment>) -> Arc<FoundryContext> {
    FoundryContext::builder(host).build()
}

/// Locks a mutex, recovering the data if a panicking handler poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
