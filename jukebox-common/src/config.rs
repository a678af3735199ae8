//! Configuration file loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument / environment variable (handled by the binaries)
//! 2. TOML config file
//! 3. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the config file looked up in each search directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Values read from `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// TCP port the server listens on
    pub port: Option<u16>,
    /// Path to the catalog database
    pub db: Option<PathBuf>,
    /// Prefix prepended to catalog paths before playing them
    pub prefix: Option<String>,
    /// Minimum log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// Maximum number of entries in the recently played list
    pub max_recent: Option<usize>,
    /// How long to wait for the database file to appear, e.g. "1m", "30s", "0"
    pub db_open_timeout: Option<String>,
    /// Static web UI root
    pub www: Option<PathBuf>,
    /// Capacity of the player event channel
    pub event_capacity: Option<usize>,
    /// Directories scanned on a full scan request
    pub dirs: Option<Vec<PathBuf>>,
}

impl FileConfig {
    /// Parse a config file body
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a config file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Candidate config file locations, most specific first.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];

    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("jukebox").join(CONFIG_FILE_NAME));
    }

    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/jukebox").join(CONFIG_FILE_NAME));
    }

    paths
}

/// Load the config file.
///
/// An explicitly named file must exist. Without one, the search paths are tried
/// in order and `Ok(None)` is returned when none exists.
pub fn load_config_file(explicit: Option<&Path>) -> Result<Option<(PathBuf, FileConfig)>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config = FileConfig::from_path(path)?;
        info!("Using config file {}", path.display());
        return Ok(Some((path.to_path_buf(), config)));
    }

    for path in config_search_paths() {
        if path.exists() {
            let config = FileConfig::from_path(&path)?;
            info!("Using config file {}", path.display());
            return Ok(Some((path, config)));
        }
        debug!("No config file at {}", path.display());
    }

    Ok(None)
}

/// Parse a short duration string: `500ms`, `30s`, `1m`, `2h`, or a bare
/// number of seconds. `0` means no wait.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || Error::Config(format!("Invalid duration '{}'", s));

    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: u64 = digits.parse().map_err(|_| invalid())?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(invalid()),
    }
}

/// Body of the sample config written by `--gen-config`
pub const SAMPLE_CONFIG: &str = r#"## TCP port for the server to listen on
port = 2001

## Path to the sqlite database that contains the mp3 information
db = "mp3.db"

## Prefix to prepend to paths read from the database
prefix = ""

## Minimum log level: trace, debug, info, warn or error.
## RUST_LOG overrides this when set.
log_level = "debug"

## Maximum number of songs in the Recently Played list
max_recent = 100

## If the database file doesn't exist, keep trying to open it for this long before exiting
db_open_timeout = "1m"

## Directory holding the web UI
# www = "/usr/share/jukebox/www"

## Directories to scan for mp3s when a full scan is requested
# dirs = ["/srv/music"]
"#;

/// Write the sample config into `dir`. Refuses to overwrite an existing file.
pub fn generate_config(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(Error::Config(format!(
            "A file named {} already exists",
            path.display()
        )));
    }
    std::fs::write(&path, SAMPLE_CONFIG)?;
    Ok(path)
}
