//! Error types for jukebox-ap

use crate::audio::AudioError;
use thiserror::Error;

/// Main error type for jukebox-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Audio backend errors
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// The player worker is gone
    #[error("Player error: {0}")]
    Player(String),

    /// The queue worker is gone
    #[error("Queue error: {0}")]
    Queue(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jukebox_common::Error> for Error {
    fn from(e: jukebox_common::Error) -> Self {
        use jukebox_common::Error as C;
        match e {
            C::Database(e) => Error::Database(e),
            C::Io(e) => Error::Io(e),
            C::Config(msg) => Error::Config(msg),
            e @ C::UnknownField(_) => Error::BadRequest(e.to_string()),
            e => Error::Internal(e.to_string()),
        }
    }
}

/// Convenience Result type using jukebox-ap Error
pub type Result<T> = std::result::Result<T, Error>;
