//! Command-line interface handling for the simulation driver.
//!
//! Every flag is optional and overrides the matching value from the
//! configuration file.

use clap::{Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the number of ticks to run
    pub ticks: Option<u64>,
    /// Optional override for the world seed
    pub seed: Option<u64>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Where to write the JSON report, if anywhere
    pub report_path: Option<PathBuf>,
}

fn command() -> Command {
    Command::new("worksim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Headless colony simulation driving the adaptive work scheduler")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("worksim.toml"),
        )
        .arg(
            Arg::new("ticks")
                .short('t')
                .long("ticks")
                .value_name("N")
                .help("Number of ticks to simulate")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_name("N")
                .help("World generation seed")
                .value_parser(clap::value_parser!(u64)),
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
            Arg::new("report")
                .short('r')
                .long("report")
                .value_name("FILE")
                .help("Write a JSON diagnostics report on exit"),
        )
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list (the first item is the binary name).
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("worksim.toml")),
            ticks: matches.get_one::<u64>("ticks").copied(),
            seed: matches.get_one::<u64>("seed").copied(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            report_path: matches.get_one::<String>("report").map(PathBuf::from),
        }
    }
}
