//! Command-line interface handling for the Foundry host.
//!
//! Every flag overrides the matching setting from the configuration file.

use clap::{Arg, ArgMatches, Command};
use foundry_event_system::IdleSourceKind;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "foundry.toml";

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the poll interval, in seconds
    pub poll_interval: Option<f64>,
    /// Optional override for the user idle source
    pub idle_source: Option<IdleSourceKind>,
}

impl CliArgs {
    /// Parses the process arguments. Exits with usage on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            poll_interval: matches.get_one::<f64>("poll-interval").copied(),
            idle_source: matches.get_one::<IdleSourceKind>("idle-source").copied(),
        }
    }
}

fn command() -> Command {
    Command::new("Foundry")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Headless host for the Foundry font-editor extension fabric")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("poll-interval")
                .short('i')
                .long("poll-interval")
                .value_name("SECONDS")
                .help("Seconds between activity poll ticks")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("idle-source")
                .long("idle-source")
                .value_name("KIND")
                .help("User idle source (auto, ioreg, unavailable, manual)")
                .value_parser(|value: &str| value.parse::<IdleSourceKind>()),
        )
}
