//! User idle-time sources.
//!
//! On macOS the HID system reports nanoseconds since the last input event;
//! elsewhere idle time is unavailable unless the host feeds it in through
//! [`ManualIdleTimeSource`].

use super::clock::Clock;
use crate::error::IdleTimeError;
use crate::utils::{lock, round_to_hundredths};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tracing::trace;

const HID_IDLE_TIME_KEY: &str = "\"HIDIdleTime\"";
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Inactivity duration and the moment the last activity ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdleSample {
    /// Seconds since the last activity.
    pub seconds: f64,
    /// Unix time at which the last activity ended.
    pub ended_at: f64,
}

impl IdleSample {
    /// Sample for an inactivity period of `seconds` ending now.
    pub fn since(seconds: f64, now: f64) -> Self {
        Self {
            seconds,
            ended_at: round_to_hundredths(now - seconds),
        }
    }
}

/// Supplies the time since the last user input.
pub trait IdleTimeSource: Send + Sync + Debug {
    /// Current user idle sample, or why it is unknown.
    fn user_idle_time(&self) -> Result<IdleSample, IdleTimeError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Which user idle source the host should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleSourceKind {
    /// `ioreg` on macOS, unavailable elsewhere.
    #[default]
    Auto,
    /// Query the HID system with `ioreg`.
    Ioreg,
    /// Always report unknown.
    Unavailable,
    /// Fed by the host through [`ManualIdleTimeSource`].
    Manual,
}

impl IdleSourceKind {
    /// Builds the source this kind names.
    pub fn build(self, clock: Arc<dyn Clock>) -> Arc<dyn IdleTimeSource> {
        match self {
            IdleSourceKind::Auto if cfg!(target_os = "macos") => {
                Arc::new(IoregIdleTimeSource::new(clock))
            }
            IdleSourceKind::Auto | IdleSourceKind::Unavailable => {
                Arc::new(UnavailableIdleTimeSource)
            }
            IdleSourceKind::Ioreg => Arc::new(IoregIdleTimeSource::new(clock)),
            IdleSourceKind::Manual => Arc::new(ManualIdleTimeSource::new()),
        }
    }
}

impl std::str::FromStr for IdleSourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(IdleSourceKind::Auto),
            "ioreg" => Ok(IdleSourceKind::Ioreg),
            "unavailable" => Ok(IdleSourceKind::Unavailable),
            "manual" => Ok(IdleSourceKind::Manual),
            other => Err(format!("unknown idle source '{}'", other)),
        }
    }
}

/// Extracts the smallest `HIDIdleTime` from `ioreg -c IOHIDSystem` output,
/// in seconds.
pub fn parse_hid_idle_time(output: &str) -> Result<f64, IdleTimeError> {
    let mut smallest: Option<u64> = None;
    let mut rest = output;

    while let Some(position) = rest.find(HID_IDLE_TIME_KEY) {
        rest = &rest[position + HID_IDLE_TIME_KEY.len()..];
        let Some(value) = rest.trim_start().strip_prefix('=') else {
            continue;
        };
        let digits: String = value
            .trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if let Ok(nanos) = digits.parse::<u64>() {
            smallest = Some(smallest.map_or(nanos, |current| current.min(nanos)));
        }
    }

    smallest
        .map(|nanos| nanos as f64 / NANOS_PER_SECOND)
        .ok_or_else(|| IdleTimeError::Parse("no HIDIdleTime entry".to_string()))
}

/// Reads idle time from the macOS HID system via `ioreg`.
#[derive(Debug)]
pub struct IoregIdleTimeSource {
    clock: Arc<dyn Clock>,
}

impl IoregIdleTimeSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdleTimeSource for IoregIdleTimeSource {
    fn user_idle_time(&self) -> Result<IdleSample, IdleTimeError> {
        let output = Command::new("ioreg").args(["-c", "IOHIDSystem"]).output()?;
        if !output.status.success() {
            return Err(IdleTimeError::Parse(format!(
                "ioreg exited with {}",
                output.status
            )));
        }
        let seconds = parse_hid_idle_time(&String::from_utf8_lossy(&output.stdout))?;
        trace!("🕒 HID idle time {:.2}s", seconds);
        Ok(IdleSample::since(seconds, self.clock.now()))
    }

    fn name(&self) -> &'static str {
        "ioreg"
    }
}

/// A source for platforms with no idle-time query.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableIdleTimeSource;

impl IdleTimeSource for UnavailableIdleTimeSource {
    fn user_idle_time(&self) -> Result<IdleSample, IdleTimeError> {
        Err(IdleTimeError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// A source whose sample is set from outside.
#[derive(Debug, Default)]
pub struct ManualIdleTimeSource {
    sample: Mutex<Option<IdleSample>>,
}

impl ManualIdleTimeSource {
    /// Starts out unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `sample` from now on.
    pub fn set(&self, sample: IdleSample) {
        *lock(&self.sample) = Some(sample);
    }

    /// Reports unknown from now on.
    pub fn set_unknown(&self) {
        *lock(&self.sample) = None;
    }
}

impl IdleTimeSource for ManualIdleTimeSource {
    fn user_idle_time(&self) -> Result<IdleSample, IdleTimeError> {
        (*lock(&self.sample)).ok_or(IdleTimeError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}
