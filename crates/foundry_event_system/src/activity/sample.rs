/// The value delivered to activity observers on each poll tick
use serde::{Deserialize, Serialize};

/// Activity snapshot taken on one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollSample {
    /// Whether the host application is frontmost.
    pub app_is_active: bool,
    /// User input happened since the previous tick.
    pub user_activity: bool,
    /// Seconds since the last user input. `None` when unknown.
    pub since_user_activity: Option<f64>,
    /// When the last user input ended. `None` when unknown.
    pub ended_user_activity: Option<f64>,
    /// A tracked font changed since the previous tick.
    pub font_activity: bool,
    /// Seconds since the last font change.
    pub since_font_activity: f64,
    /// When the last font change happened.
    pub ended_font_activity: f64,
    /// Last time the application became active, if observed.
    pub became_active_at: Option<f64>,
    /// Last time the application resigned active status, if observed.
    pub resigned_active_at: Option<f64>,
    /// When this tick ran.
    pub polled_at: f64,
}

impl PollSample {
    /// The "ended at" pair used to recognise a repeated inactivity period.
    pub fn period(&self) -> (Option<f64>, f64) {
        (self.ended_user_activity, self.ended_font_activity)
    }
}
