//! # Jukebox Common Library
//!
//! Shared code for the jukebox service and its command-line tools:
//! - Error type
//! - Configuration file loading
//! - `Tee` fan-out broadcaster
//! - mp3 catalog database (schema, upsert, query with paging)
//! - mp3 tag reading and directory scanner

pub mod config;
pub mod db;
pub mod error;
pub mod scan;
pub mod tags;
pub mod tee;

pub use error::{Error, Result};
pub use tee::{Subscriber, Tee};
