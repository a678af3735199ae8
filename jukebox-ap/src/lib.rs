//! # Jukebox Audio Player Library (jukebox-ap)
//!
//! A single-listener mp3 jukebox controlled over HTTP and WebSocket.
//!
//! **Purpose:** Play mp3 files one at a time through a command-serialized
//! player, feed it from a reorderable play queue, and broadcast player,
//! queue, scan and repeat-mode events to every connected browser.
//!
//! **Architecture:** symphonia decoding and cpal output behind the
//! [`audio::AudioBackend`] seam, a player worker on its own thread, tokio
//! tasks for the queue, the scanner and event routing, and an axum front end.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod prefix;
pub mod scanner;
pub mod state;

pub use error::{Error, Result};
pub use state::AppContext;
