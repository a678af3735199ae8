//! Audio backend seam
//!
//! The player drives decoding and output exclusively through these traits.
//! [`NativeBackend`] is the real implementation (symphonia decoding, cpal
//! output). Tests substitute a scripted backend.
//!
//! Offsets and lengths are counted in samples per channel (frames).

pub mod decoder;
pub mod output;

pub use decoder::Mp3Reader;
pub use output::{CpalWriter, SoftwareVolume};

use crate::playback::types::Info;
use std::path::Path;
use thiserror::Error;

/// Failures of the audio backend. The display text starts with the failure
/// class, followed by the detail reported by the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Creating reader failed: {0}")]
    CreateReader(String),

    #[error("Creating writer failed: {0}")]
    CreateWriter(String),

    #[error("Seeking failed: {0}")]
    Seek(String),

    #[error("Length/Offset read failed: {0}")]
    Position(String),

    #[error("Reading from input failed: {0}")]
    Read(String),

    #[error("Writing to output failed: {0}")]
    Write(String),

    #[error("Getting volume/info failed: {0}")]
    Query(String),

    #[error("Setting volume failed: {0}")]
    SetVolume(String),
}

/// Which outputs a volume change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeTarget {
    /// The output the player writes to
    Default,
    /// Every output
    All,
}

/// An open decode session for one file
pub trait TrackReader {
    /// Decode the next block of interleaved samples. `None` at end of track.
    fn read_block(&mut self) -> Result<Option<&[f32]>, AudioError>;

    /// Reposition the decode cursor
    fn seek(&mut self, sample: u64) -> Result<(), AudioError>;

    /// Track length
    fn length(&self) -> Result<u64, AudioError>;

    /// Current decode position
    fn offset(&self) -> Result<u64, AudioError>;

    /// Derived facts about the track
    fn info(&self) -> Result<Info, AudioError>;

    /// Interleaved channel count of the blocks returned by `read_block`
    fn channels(&self) -> u16;
}

/// An open output device. Dropping it closes the device.
pub trait TrackWriter {
    /// Write interleaved samples, blocking at the playback rate
    fn write(&mut self, samples: &[f32]) -> Result<(), AudioError>;
}

/// Factory for readers and writers plus the volume control.
///
/// The backend moves into the player worker thread, so it must be `Send`;
/// the readers and writers it creates never leave that thread.
pub trait AudioBackend: Send {
    fn open(&mut self, path: &Path) -> Result<Box<dyn TrackReader>, AudioError>;

    fn open_output(&mut self, reader: &dyn TrackReader) -> Result<Box<dyn TrackWriter>, AudioError>;

    /// Volume in percent
    fn volume(&self) -> Result<u8, AudioError>;

    fn set_volume(&mut self, percent: u8, target: VolumeTarget) -> Result<(), AudioError>;
}

/// symphonia decoding with cpal output.
///
/// Volume is a software gain applied in the output callback and shared by
/// every writer this backend opens, so both volume targets behave the same.
pub struct NativeBackend {
    volume: SoftwareVolume,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self {
            volume: SoftwareVolume::new(100),
        }
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NativeBackend {
    fn open(&mut self, path: &Path) -> Result<Box<dyn TrackReader>, AudioError> {
        Ok(Box::new(Mp3Reader::open(path)?))
    }

    fn open_output(&mut self, reader: &dyn TrackReader) -> Result<Box<dyn TrackWriter>, AudioError> {
        let info = reader.info().map_err(|e| AudioError::CreateWriter(e.to_string()))?;
        let writer = CpalWriter::open(info.sample_rate, reader.channels(), self.volume.clone())?;
        Ok(Box::new(writer))
    }

    fn volume(&self) -> Result<u8, AudioError> {
        self.volume.get()
    }

    fn set_volume(&mut self, percent: u8, _target: VolumeTarget) -> Result<(), AudioError> {
        self.volume.set(percent)
    }
}
