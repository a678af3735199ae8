//! Playback types shared across modules

use serde::Serialize;
use std::fmt;

/// State of the player. `Empty` exactly when no track is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlayerState {
    #[default]
    Empty,
    Playing,
    Paused,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlayerState::Empty => "empty",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Events emitted by the player, plus `QueueChange` from the queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Event {
    /// Playback position, in samples
    OffsetChange(i64),
    StateChange(PlayerState),
    /// Volume in percent
    VolumeChange(u8),
    QueueChange,
    Error(String),
}

/// Point-in-time snapshot of the player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerStatus {
    /// Position in the current track, in samples
    pub offset: i64,
    /// Length of the current track, in samples
    pub size: i64,
    pub state: PlayerState,
    pub volume: u8,
    /// Path of the loaded track; empty when nothing is loaded
    pub path: String,
}

/// Facts about the loaded track
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Info {
    /// Average bit rate in kbit/s
    pub bit_rate: u32,
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
    pub seconds_per_sample: f64,
}

/// One entry of the play queue.
///
/// `id` is assigned at enqueue time and never changes, so an entry can be
/// tracked across reorderings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueElem {
    pub filename: String,
    pub id: u32,
}
