//! Scripted audio backend
//!
//! Tracks are silent blocks of a fixed size. Failures and write delay are
//! read from a shared [`MockScript`] on every call, so a test can change
//! them while the player runs.

use jukebox_ap::audio::{AudioBackend, AudioError, TrackReader, TrackWriter, VolumeTarget};
use jukebox_ap::playback::Info;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 44100;
pub const CHANNELS: u16 = 2;

/// Behaviour of a [`MockBackend`]
#[derive(Debug, Clone)]
pub struct MockScript {
    /// Blocks per track
    pub blocks: u64,
    /// Frames per block
    pub block_frames: u64,
    /// Sleep in every write
    pub write_delay: Duration,
    pub fail_open: bool,
    pub fail_output: bool,
    pub fail_seek: bool,
    pub fail_read: bool,
    pub fail_write: bool,
    pub fail_volume: bool,
    /// Paths opened so far, in order
    pub opened: Vec<String>,
    /// Number of successful writes
    pub writes: u64,
    pub volume: u8,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            blocks: 10_000,
            block_frames: 1152,
            write_delay: Duration::from_millis(1),
            fail_open: false,
            fail_output: false,
            fail_seek: false,
            fail_read: false,
            fail_write: false,
            fail_volume: false,
            opened: Vec::new(),
            writes: 0,
            volume: 50,
        }
    }
}

pub struct MockBackend {
    script: Arc<Mutex<MockScript>>,
}

impl MockBackend {
    /// A backend and the handle to its script
    pub fn new(script: MockScript) -> (Self, Arc<Mutex<MockScript>>) {
        let script = Arc::new(Mutex::new(script));
        (
            Self {
                script: script.clone(),
            },
            script,
        )
    }

    /// Tracks that end after `blocks` blocks
    pub fn with_blocks(blocks: u64) -> (Self, Arc<Mutex<MockScript>>) {
        Self::new(MockScript {
            blocks,
            ..Default::default()
        })
    }
}

impl AudioBackend for MockBackend {
    fn open(&mut self, path: &Path) -> Result<Box<dyn TrackReader>, AudioError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_open {
            return Err(AudioError::CreateReader(format!("{}: scripted failure", path.display())));
        }
        script.opened.push(path.to_string_lossy().to_string());

        let frames = script.block_frames;
        Ok(Box::new(MockReader {
            script: self.script.clone(),
            total: script.blocks * frames,
            position: 0,
            block: vec![0.0; (frames * CHANNELS as u64) as usize],
            block_frames: frames,
        }))
    }

    fn open_output(&mut self, _reader: &dyn TrackReader) -> Result<Box<dyn TrackWriter>, AudioError> {
        if self.script.lock().unwrap().fail_output {
            return Err(AudioError::CreateWriter("scripted failure".to_string()));
        }
        Ok(Box::new(MockWriter {
            script: self.script.clone(),
        }))
    }

    fn volume(&self) -> Result<u8, AudioError> {
        let script = self.script.lock().unwrap();
        if script.fail_volume {
            return Err(AudioError::Query("scripted failure".to_string()));
        }
        Ok(script.volume)
    }

    fn set_volume(&mut self, percent: u8, _target: VolumeTarget) -> Result<(), AudioError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_volume {
            return Err(AudioError::SetVolume("scripted failure".to_string()));
        }
        script.volume = percent;
        Ok(())
    }
}

struct MockReader {
    script: Arc<Mutex<MockScript>>,
    total: u64,
    position: u64,
    block: Vec<f32>,
    block_frames: u64,
}

impl TrackReader for MockReader {
    fn read_block(&mut self) -> Result<Option<&[f32]>, AudioError> {
        if self.script.lock().unwrap().fail_read {
            return Err(AudioError::Read("scripted failure".to_string()));
        }
        if self.position >= self.total {
            return Ok(None);
        }
        self.position += self.block_frames;
        Ok(Some(&self.block))
    }

    fn seek(&mut self, sample: u64) -> Result<(), AudioError> {
        if self.script.lock().unwrap().fail_seek {
            return Err(AudioError::Seek("scripted failure".to_string()));
        }
        self.position = sample.min(self.total);
        Ok(())
    }

    fn length(&self) -> Result<u64, AudioError> {
        Ok(self.total)
    }

    fn offset(&self) -> Result<u64, AudioError> {
        Ok(self.position)
    }

    fn info(&self) -> Result<Info, AudioError> {
        Ok(Info {
            bit_rate: 128,
            sample_rate: SAMPLE_RATE,
            duration: self.total as f64 / SAMPLE_RATE as f64,
            seconds_per_sample: 1.0 / SAMPLE_RATE as f64,
        })
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }
}

struct MockWriter {
    script: Arc<Mutex<MockScript>>,
}

impl TrackWriter for MockWriter {
    fn write(&mut self, _samples: &[f32]) -> Result<(), AudioError> {
        let (delay, fail) = {
            let script = self.script.lock().unwrap();
            (script.write_delay, script.fail_write)
        };
        std::thread::sleep(delay);
        if fail {
            return Err(AudioError::Write("scripted failure".to_string()));
        }
        self.script.lock().unwrap().writes += 1;
        Ok(())
    }
}
