//! jukebox-ap configuration
//!
//! Command line and environment take priority over the config file, which
//! takes priority over compiled defaults.

use crate::error::{Error, Result};
use clap::Parser;
use jukebox_common::config::{load_config_file, parse_duration, FileConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 2001;
pub const DEFAULT_DB: &str = "mp3.db";
pub const DEFAULT_LOG_LEVEL: &str = "debug";
pub const DEFAULT_MAX_RECENT: usize = 100;
pub const DEFAULT_DB_OPEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the web UI is looked for when none is configured
pub const WWW_SEARCH_PATHS: [&str; 2] = ["www", "/usr/share/jukebox/www"];

/// Command-line arguments for jukebox-ap
#[derive(Parser, Debug, Default)]
#[command(name = "jukebox-ap")]
#[command(about = "mp3 jukebox: a player controlled over HTTP and WebSocket")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "JUKEBOX_PORT")]
    pub port: Option<u16>,

    /// Path to the sqlite database holding the mp3 catalog
    #[arg(long, env = "JUKEBOX_DB")]
    pub db: Option<PathBuf>,

    /// Prefix prepended to catalog paths before playing them
    #[arg(long, env = "JUKEBOX_PREFIX")]
    pub prefix: Option<String>,

    /// Config file to read instead of searching the default locations
    #[arg(short, long, env = "JUKEBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error). RUST_LOG overrides.
    #[arg(long, env = "JUKEBOX_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// How long to wait for the database file to appear, e.g. "1m", "0"
    #[arg(long, env = "JUKEBOX_DB_OPEN_TIMEOUT")]
    pub db_open_timeout: Option<String>,

    /// Directory holding the web UI
    #[arg(long, env = "JUKEBOX_WWW")]
    pub www: Option<PathBuf>,

    /// Write a sample config.toml into the current directory and exit
    #[arg(short = 'g', long)]
    pub gen_config: bool,

    /// Directories scanned on a full scan request
    pub dirs: Vec<PathBuf>,
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub prefix: String,
    pub log_level: String,
    pub max_recent: usize,
    pub db_open_timeout: Duration,
    pub www: Option<PathBuf>,
    pub event_capacity: usize,
    pub dirs: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB),
            prefix: String::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            max_recent: DEFAULT_MAX_RECENT,
            db_open_timeout: DEFAULT_DB_OPEN_TIMEOUT,
            www: None,
            event_capacity: crate::playback::DEFAULT_EVENT_CAPACITY,
            dirs: Vec::new(),
        }
    }
}

impl Config {
    /// Load the config file (explicit or searched for) and merge it with `args`
    pub fn load(args: &Args) -> Result<Self> {
        let file = load_config_file(args.config.as_deref())?
            .map(|(_, file)| file)
            .unwrap_or_default();
        Self::merge(args, file)
    }

    /// Layer `args` over `file` over the defaults
    pub fn merge(args: &Args, file: FileConfig) -> Result<Self> {
        let defaults = Config::default();

        let db_open_timeout = match args.db_open_timeout.as_deref().or(file.db_open_timeout.as_deref()) {
            Some(s) => parse_duration(s)?,
            None => defaults.db_open_timeout,
        };

        let event_capacity = file.event_capacity.unwrap_or(defaults.event_capacity);
        if event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }

        let www = args
            .www
            .clone()
            .or(file.www)
            .or_else(|| find_www(&WWW_SEARCH_PATHS));

        let dirs = if args.dirs.is_empty() {
            file.dirs.unwrap_or_default()
        } else {
            args.dirs.clone()
        };

        Ok(Self {
            port: args.port.or(file.port).unwrap_or(defaults.port),
            db_path: args.db.clone().or(file.db).unwrap_or(defaults.db_path),
            prefix: args.prefix.clone().or(file.prefix).unwrap_or(defaults.prefix),
            log_level: args
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
            max_recent: file.max_recent.unwrap_or(defaults.max_recent),
            db_open_timeout,
            www,
            event_capacity,
            dirs,
        })
    }
}

fn find_www(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(Path::new)
        .find(|p| p.is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::merge(&Args::default(), FileConfig::default()).unwrap();
        assert_eq!(config.port, 2001);
        assert_eq!(config.db_path, PathBuf::from("mp3.db"));
        assert_eq!(config.prefix, "");
        assert_eq!(config.max_recent, 100);
        assert_eq!(config.db_open_timeout, Duration::from_secs(60));
        assert_eq!(config.event_capacity, 1000);
        assert!(config.dirs.is_empty());
    }

    #[test]
    fn test_args_override_file() {
        let file = FileConfig::parse(
            r#"
            port = 3000
            db = "/var/lib/jukebox/mp3.db"
            prefix = "/srv/music"
            db_open_timeout = "0"
            dirs = ["/srv/music"]
            "#,
        )
        .unwrap();

        let args = Args {
            port: Some(4000),
            dirs: vec![PathBuf::from("/home/music")],
            ..Default::default()
        };

        let config = Config::merge(&args, file).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/jukebox/mp3.db"));
        assert_eq!(config.prefix, "/srv/music");
        assert_eq!(config.db_open_timeout, Duration::ZERO);
        assert_eq!(config.dirs, vec![PathBuf::from("/home/music")]);
    }

    #[test]
    fn test_bad_duration_is_config_error() {
        let args = Args {
            db_open_timeout: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Config::merge(&args, FileConfig::default()),
            Err(Error::Config(_))
        ));
    }
}
