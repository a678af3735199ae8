//! mp3 decoding using symphonia

use super::{AudioError, TrackReader};
use crate::playback::types::Info;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Decode session for one mp3 file
pub struct Mp3Reader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    /// Total frames, when the stream header reports it
    n_frames: Option<u64>,
    file_size: u64,
    /// Frames decoded so far, or the position of the last seek
    offset: u64,
    buffer: Option<SampleBuffer<f32>>,
}

impl Mp3Reader {
    pub fn open(path: &Path) -> Result<Self, AudioError> {
        let file = File::open(path)
            .map_err(|e| AudioError::CreateReader(format!("{}: {}", path.display(), e)))?;
        let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::CreateReader(format!("{}: {}", path.display(), e)))?;

        let format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| AudioError::CreateReader(format!("{}: no audio track", path.display())))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::CreateReader(format!("{}: {}", path.display(), e)))?;

        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);

        debug!(
            "Opened {}: {} Hz, {} channels, {:?} frames",
            path.display(),
            sample_rate,
            channels,
            codec_params.n_frames
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            n_frames: codec_params.n_frames,
            file_size,
            offset: 0,
            buffer: None,
        })
    }
}

impl TrackReader for Mp3Reader {
    fn read_block(&mut self) -> Result<Option<&[f32]>, AudioError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(AudioError::Read(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let capacity = decoded.capacity();
                    let frames = decoded.frames() as u64;

                    let too_small = self
                        .buffer
                        .as_ref()
                        .map_or(true, |b| b.capacity() < capacity * spec.channels.count());
                    if too_small {
                        self.buffer = Some(SampleBuffer::new(capacity as u64, spec));
                    }
                    if let Some(buffer) = self.buffer.as_mut() {
                        buffer.copy_interleaved_ref(decoded);
                    }

                    self.offset = packet.ts() + frames;
                    break;
                }
                // Corrupt frame: skip it
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(AudioError::Read(format!("decoding: {}", e))),
            }
        }

        Ok(self.buffer.as_ref().map(|b| b.samples()))
    }

    fn seek(&mut self, sample: u64) -> Result<(), AudioError> {
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: sample,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| AudioError::Seek(e.to_string()))?;

        self.decoder.reset();
        self.offset = seeked.actual_ts;
        Ok(())
    }

    fn length(&self) -> Result<u64, AudioError> {
        self.n_frames
            .ok_or_else(|| AudioError::Position("stream does not report its length".to_string()))
    }

    fn offset(&self) -> Result<u64, AudioError> {
        Ok(self.offset)
    }

    fn info(&self) -> Result<Info, AudioError> {
        let seconds_per_sample = 1.0 / f64::from(self.sample_rate);
        let duration = self.n_frames.map(|n| n as f64 * seconds_per_sample).unwrap_or(0.0);
        let bit_rate = if duration > 0.0 {
            (self.file_size as f64 * 8.0 / duration / 1000.0).round() as u32
        } else {
            0
        };

        Ok(Info {
            bit_rate,
            sample_rate: self.sample_rate,
            duration,
            seconds_per_sample,
        })
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}
