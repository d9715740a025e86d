//! Configuration management for the Foundry host.
//!
//! Settings are loaded from a TOML file; a missing file is written out with
//! the defaults so it can be edited.

use foundry_event_system::{
    ActivityConfig, ActivityObserverOptions, AppStateRequirement, FontInfo, FoundryConfig,
    IdleSourceKind, DEFAULT_INACTIVITY_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    DEFAULT_INACTIVITY_THRESHOLD
}

fn default_identifier() -> String {
    "com.foundry.activity-logger".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Activity poller settings
    #[serde(default)]
    pub activity: ActivityConfig,
    /// Headless host settings
    #[serde(default)]
    pub host: HostSettings,
    /// Activity logger extension settings
    #[serde(default)]
    pub extension: ExtensionSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// What the headless host reports to the fabric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Where user idle time comes from
    #[serde(default)]
    pub idle_source: IdleSourceKind,
    /// Whether the application reports itself as frontmost
    #[serde(default = "default_true")]
    pub app_active: bool,
    /// Fonts opened at startup
    #[serde(default)]
    pub fonts: Vec<FontSettings>,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            idle_source: IdleSourceKind::Auto,
            app_active: true,
            fonts: Vec::new(),
        }
    }
}

/// A font the headless host opens at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSettings {
    pub family: Option<String>,
    pub style: Option<String>,
    pub path: Option<String>,
    #[serde(default = "default_true")]
    pub has_interface: bool,
}

impl FontSettings {
    pub fn info(&self) -> FontInfo {
        FontInfo {
            family_name: self.family.clone(),
            style_name: self.style.clone(),
        }
    }
}

/// Activity logger thresholds.
///
/// A threshold of `0` ignores that kind of activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionSettings {
    #[serde(default = "default_identifier")]
    pub identifier: String,
    #[serde(default)]
    pub app_state: AppStateRequirement,
    #[serde(default = "default_threshold")]
    pub since_user_activity: f64,
    #[serde(default = "default_threshold")]
    pub since_font_activity: f64,
    #[serde(default)]
    pub repeat: bool,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            identifier: default_identifier(),
            app_state: AppStateRequirement::Any,
            since_user_activity: DEFAULT_INACTIVITY_THRESHOLD,
            since_font_activity: DEFAULT_INACTIVITY_THRESHOLD,
            repeat: false,
        }
    }
}

impl ExtensionSettings {
    pub fn observer_options(&self) -> ActivityObserverOptions {
        let threshold = |seconds: f64| (seconds > 0.0).then_some(seconds);
        ActivityObserverOptions::default()
            .with_app_state(self.app_state)
            .with_user_inactivity(threshold(self.since_user_activity))
            .with_font_inactivity(threshold(self.since_font_activity))
            .repeating(self.repeat)
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// The fabric's share of the configuration.
    pub fn to_foundry_config(&self) -> FoundryConfig {
        FoundryConfig {
            activity: self.activity.clone(),
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        self.to_foundry_config().validate()?;

        for (name, value) in [
            ("since_user_activity", self.extension.since_user_activity),
            ("since_font_activity", self.extension.since_font_activity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("extension.{} must be a non-negative number", name));
            }
        }

        if self.extension.identifier.trim().is_empty() {
            return Err("extension.identifier cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
