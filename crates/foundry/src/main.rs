//! Main application entry point for the Foundry host
//!
//! Loads configuration, initialises logging, builds the shared fabric around
//! an in-memory host, installs the activity logger extension and runs until
//! a shutdown signal arrives.

mod activity_logger;
mod cli;
mod config;
mod signals;

use activity_logger::{ActivityLogger, SUMMARY_REQUEST};
use cli::CliArgs;
use config::{AppConfig, LoggingSettings};
use foundry_event_system::{Font, FontHandle, FoundryContext, InMemoryHost, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Logging Setup
// ============================================================================

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level.
fn setup_logging(config: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

// ============================================================================
// Application
// ============================================================================

/// The headless host with its fabric and extension.
pub struct Application {
    config: AppConfig,
    host: Arc<InMemoryHost>,
    context: Arc<FoundryContext>,
    logger: Arc<ActivityLogger>,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        // Configuration is loaded before logging exists.
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(poll_interval) = args.poll_interval {
            config.activity.poll_interval_secs = poll_interval;
        }
        if let Some(idle_source) = args.idle_source {
            config.host.idle_source = idle_source;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {}", e).into());
        }

        if let Err(e) = setup_logging(&config.logging) {
            eprintln!("⚠️ Logging already initialized: {}", e);
        }
        info!("📂 Config: {}", args.config_path.display());

        let host = Arc::new(InMemoryHost::new());
        host.set_active(config.host.app_active);

        let clock = Arc::new(SystemClock);
        let context = FoundryContext::builder(host.clone())
            .clock(clock.clone())
            .idle_source(config.host.idle_source.build(clock))
            .config(config.to_foundry_config())
            .build();

        // The configured state is the host's first app-active edge.
        if config.host.app_active {
            context.app_did_become_active();
        } else {
            context.app_did_resign_active();
        }

        let logger = ActivityLogger::install(
            context.clone(),
            &config.extension.identifier,
            config.extension.observer_options(),
        )?;

        Ok(Self {
            config,
            host,
            context,
            logger,
        })
    }

    fn open_configured_fonts(&self) -> Vec<FontHandle> {
        let fonts: Vec<FontHandle> = self
            .config
            .host
            .fonts
            .iter()
            .map(|settings| match &settings.path {
                Some(path) => Font::open(path, settings.info(), settings.has_interface),
                None => Font::new(settings.info(), settings.has_interface),
            })
            .collect();

        for font in &fonts {
            self.host.open_font(font);
            self.context.fonts().font_did_open(font);
        }
        fonts
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Foundry host");
        info!("📋 Configuration Summary:");
        info!("  ⏱️ Poll interval: {:?}", self.context.activity().interval());
        info!("  👀 Idle source: {:?}", self.config.host.idle_source);
        info!("  ☀️ App active: {}", self.config.host.app_active);
        info!("  🔌 Extension: {}", self.config.extension.identifier);

        let fonts = self.open_configured_fonts();
        info!("📂 Opened {} configured font(s)", fonts.len());

        let monitoring_handle = {
            let context = self.context.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(STATS_INTERVAL);
                interval.tick().await;
                let mut last_published = 0u64;

                loop {
                    interval.tick().await;

                    let stats = context.notifications().stats();
                    let published_this_period = stats.events_published - last_published;
                    last_published = stats.events_published;

                    info!(
                        "📊 Fabric Health - {} notifications/min | {} subscriptions | {} responders | {} activity observers | {} ticks",
                        published_this_period,
                        stats.total_subscriptions,
                        context.requests().responder_count(),
                        context.activity().observer_count(),
                        context.activity().tick_count()
                    );
                }
            })
        };

        info!("✅ Foundry host is now running");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        signals::wait_for_shutdown().await?;

        info!("🛑 Shutdown signal received, draining the fabric...");
        monitoring_handle.abort();

        for font in &fonts {
            self.context.fonts().font_will_close(font);
            self.host.close_font(font);
            self.context.fonts().font_did_close();
        }

        let summary = self
            .context
            .requests()
            .send::<(), activity_logger::LoggerSummary>(SUMMARY_REQUEST, None, ());
        if let Some(summary) = summary {
            info!("📊 Final Statistics:");
            info!("  - Fonts opened: {}", summary.fonts_opened);
            info!("  - Fonts closed: {}", summary.fonts_closed);
            info!("  - Inactivity reports: {}", summary.inactivity_reports);
        }

        self.logger.uninstall();
        let drained = self.context.shutdown();
        let stats = self.context.notifications().stats();
        info!(
            "  - Notifications published: {} | delivered: {} | handler failures: {}",
            stats.events_published, stats.notifications_delivered, stats.handler_failures
        );
        info!(
            "  - Drained {} subscription(s), {} responder(s), {} activity observer(s)",
            drained.subscriptions, drained.responders, drained.activity_observers
        );

        info!("✅ Foundry host shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_application_applies_cli_overrides() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("foundry.toml");
        let config = r#"
[activity]
poll_interval_secs = 5.0

[host]
idle_source = "unavailable"

[[host.fonts]]
family = "Sans"
style = "Regular"

[logging]
level = "warn"
json_format = false
"#;
        tokio::fs::write(&config_path, config).await.unwrap();

        let args = CliArgs {
            config_path,
            log_level: Some("error".to_string()),
            json_logs: false,
            poll_interval: Some(0.25),
            idle_source: Some(foundry_event_system::IdleSourceKind::Manual),
        };
        let app = Application::new(args).await.unwrap();

        assert_eq!(app.config.logging.level, "error");
        assert_eq!(app.context.activity().interval(), Duration::from_millis(250));
        assert_eq!(app.context.activity().observer_count(), 1);

        let fonts = app.open_configured_fonts();
        assert_eq!(fonts.len(), 1);
        assert_eq!(app.context.fonts().all_fonts().len(), 1);
        assert_eq!(app.logger.summary().fonts_opened, 1);

        app.logger.uninstall();
        app.context.shutdown();
    }

    #[tokio::test]
    async fn test_inactive_host_measures_user_idle_from_startup() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("foundry.toml");
        let config = r#"
[activity]
poll_interval_secs = 60.0

[host]
idle_source = "manual"
app_active = false

[extension]
since_user_activity = 0.2
since_font_activity = 0.0
"#;
        tokio::fs::write(&config_path, config).await.unwrap();

        let args = CliArgs {
            config_path,
            log_level: None,
            json_logs: false,
            poll_interval: None,
            idle_source: None,
        };
        let app = Application::new(args).await.unwrap();
        let activity = app.context.activity();

        let first = activity.poll_once();
        assert!(!first.app_is_active);
        assert!(first.resigned_active_at.is_some());
        assert!(first.since_user_activity.is_some());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let second = activity.poll_once();
        assert!(second.since_user_activity.is_some_and(|since| since >= 0.2));
        assert_eq!(second.ended_user_activity, first.resigned_active_at);
        assert_eq!(app.logger.summary().inactivity_reports, 1);

        app.logger.uninstall();
        app.context.shutdown();
    }

    #[tokio::test]
    async fn test_application_rejects_invalid_overrides() {
        let dir = TempDir::new().unwrap();
        let args = CliArgs {
            config_path: dir.path().join("foundry.toml"),
            log_level: Some("shouty".to_string()),
            json_logs: false,
            poll_interval: None,
            idle_source: None,
        };
        assert!(Application::new(args).await.is_err());
    }
}
