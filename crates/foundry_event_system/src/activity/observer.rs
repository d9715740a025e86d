/// Activity observer registrations and their matching rules
use super::sample::PollSample;
use crate::error::EventError;
use crate::types::{ActivityObserverId, ObjectRef};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// Default inactivity threshold, in seconds, for both activity kinds.
pub const DEFAULT_INACTIVITY_THRESHOLD: f64 = 2.0;

/// Which application state an observer wants to be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStateRequirement {
    /// Notify whether or not the application is active.
    #[default]
    Any,
    /// Notify only while the application is active.
    Active,
    /// Notify only while the application is not active.
    Inactive,
}

impl AppStateRequirement {
    /// Maps `Some(true)` to `Active`, `Some(false)` to `Inactive`, `None` to `Any`.
    pub fn from_flag(app_is_active: Option<bool>) -> Self {
        match app_is_active {
            Some(true) => AppStateRequirement::Active,
            Some(false) => AppStateRequirement::Inactive,
            None => AppStateRequirement::Any,
        }
    }

    pub fn matches(self, app_is_active: bool) -> bool {
        match self {
            AppStateRequirement::Any => true,
            AppStateRequirement::Active => app_is_active,
            AppStateRequirement::Inactive => !app_is_active,
        }
    }
}

/// How long each kind of inactivity must last before an observer fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityObserverOptions {
    /// Required application state.
    pub app_state: AppStateRequirement,
    /// Seconds of user inactivity required. `None` or zero ignores user activity.
    pub since_user_activity: Option<f64>,
    /// Seconds of font inactivity required. `None` or zero ignores font activity.
    pub since_font_activity: Option<f64>,
    /// Fire on every tick of an inactivity period instead of once.
    pub repeat: bool,
}

impl Default for ActivityObserverOptions {
    fn default() -> Self {
        Self {
            app_state: AppStateRequirement::Any,
            since_user_activity: Some(DEFAULT_INACTIVITY_THRESHOLD),
            since_font_activity: Some(DEFAULT_INACTIVITY_THRESHOLD),
            repeat: false,
        }
    }
}

impl ActivityObserverOptions {
    pub fn with_app_state(mut self, app_state: AppStateRequirement) -> Self {
        self.app_state = app_state;
        self
    }

    /// Sets the user threshold. `None` or zero ignores user activity.
    pub fn with_user_inactivity(mut self, seconds: Option<f64>) -> Self {
        self.since_user_activity = active_threshold(seconds);
        self
    }

    /// Sets the font threshold. `None` or zero ignores font activity.
    pub fn with_font_inactivity(mut self, seconds: Option<f64>) -> Self {
        self.since_font_activity = active_threshold(seconds);
        self
    }

    pub fn repeating(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }
}

/// A zero or negative threshold means "ignore this kind of activity".
fn active_threshold(seconds: Option<f64>) -> Option<f64> {
    seconds.filter(|seconds| *seconds > 0.0)
}

pub(super) type ActivityCallback =
    Arc<dyn Fn(&(dyn Any + Send + Sync), &PollSample) -> Result<(), EventError> + Send + Sync>;

/// One observer in the poller's table.
pub(super) struct ActivityObserverEntry {
    pub(super) id: ActivityObserverId,
    pub(super) observer: ObjectRef,
    pub(super) options: ActivityObserverOptions,
    pub(super) callback: ActivityCallback,
    /// "Ended at" pair of the period last reported.
    pub(super) notified: Option<(Option<f64>, f64)>,
}

impl ActivityObserverEntry {
    /// True if this entry should be invoked for `sample`.
    pub(super) fn matches(&self, sample: &PollSample) -> bool {
        if !self.options.app_state.matches(sample.app_is_active) {
            return false;
        }
        if let Some(threshold) = active_threshold(self.options.since_user_activity) {
            match sample.since_user_activity {
                Some(since) if threshold <= since => {}
                _ => return false,
            }
        }
        if let Some(threshold) = active_threshold(self.options.since_font_activity) {
            if threshold > sample.since_font_activity {
                return false;
            }
        }
        if !self.options.repeat && self.notified == Some(sample.period()) {
            return false;
        }
        true
    }
}
