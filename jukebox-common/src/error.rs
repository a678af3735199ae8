//! Errors of the catalog, scanner and config loading

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Catalog database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable config file or bad config value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database file did not appear within the wait
    #[error("Timeout waiting for database file {} to exist", .0.display())]
    DatabaseMissing(PathBuf),

    /// Scan root that is not a directory
    #[error("Opening directory {} failed", .0.display())]
    NotADirectory(PathBuf),

    #[error("Reading tags from {} failed: {reason}", path.display())]
    Tags { path: PathBuf, reason: String },

    /// Catalog field name outside artist, album, title, tracknum and path
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    /// A blocking tag read panicked or was cancelled
    #[error("Scan task failed: {0}")]
    ScanTask(#[from] tokio::task::JoinError),
}
