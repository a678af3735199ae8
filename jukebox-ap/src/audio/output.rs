//! Audio output using cpal
//!
//! The player thread pushes decoded samples into a ring buffer; the cpal
//! callback drains it. `write` blocks while the ring is full, which paces the
//! player at the playback rate.

use super::{AudioError, TrackWriter};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

/// How long the ring buffer lasts at the playback rate
const RING_MILLIS: u32 = 250;

/// Sleep between attempts to push into a full ring
const FULL_RING_BACKOFF: Duration = Duration::from_millis(5);

/// Shared software gain, in percent
#[derive(Clone)]
pub struct SoftwareVolume(Arc<Mutex<u8>>);

impl SoftwareVolume {
    pub fn new(percent: u8) -> Self {
        Self(Arc::new(Mutex::new(percent.min(100))))
    }

    pub fn get(&self) -> Result<u8, AudioError> {
        self.0
            .lock()
            .map(|v| *v)
            .map_err(|e| AudioError::Query(e.to_string()))
    }

    pub fn set(&self, percent: u8) -> Result<(), AudioError> {
        let mut v = self.0.lock().map_err(|e| AudioError::SetVolume(e.to_string()))?;
        *v = percent.min(100);
        Ok(())
    }

    /// Linear gain for the output callback. Silence if the lock is poisoned.
    fn gain(&self) -> f32 {
        self.0.lock().map(|v| f32::from(*v) / 100.0).unwrap_or(0.0)
    }
}

/// An open cpal output stream
pub struct CpalWriter {
    // Dropping the stream closes the device.
    _stream: Stream,
    producer: HeapProd<f32>,
    in_channels: usize,
    out_channels: usize,
    error_flag: Arc<AtomicBool>,
    scratch: Vec<f32>,
}

impl CpalWriter {
    /// Open the default output device at `sample_rate`.
    ///
    /// There is no resampling: a device that cannot run at the track's rate is
    /// an error.
    pub fn open(sample_rate: u32, channels: u16, volume: SoftwareVolume) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::CreateWriter("No default output device found".to_string()))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (config, sample_format) = best_config(&device, sample_rate, channels)?;

        debug!(
            "Audio config on {}: sample_rate={}, channels={}, format={:?}",
            name, config.sample_rate.0, config.channels, sample_format
        );

        let out_channels = config.channels as usize;
        let capacity = (sample_rate * RING_MILLIS / 1000) as usize * out_channels;
        let (producer, consumer) = HeapRb::<f32>::new(capacity.max(1024)).split();

        let error_flag = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, volume, error_flag.clone())?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, volume, error_flag.clone())?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, volume, error_flag.clone())?,
            other => {
                return Err(AudioError::CreateWriter(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::CreateWriter(format!("Failed to start stream: {}", e)))?;

        info!("Opened audio output {}", name);

        Ok(Self {
            _stream: stream,
            producer,
            in_channels: channels.max(1) as usize,
            out_channels,
            error_flag,
            scratch: Vec::new(),
        })
    }

    /// Map interleaved frames from the track's channel layout to the device's
    fn remap<'a>(&'a mut self, samples: &'a [f32]) -> &'a [f32] {
        if self.in_channels == self.out_channels {
            return samples;
        }

        self.scratch.clear();
        for frame in samples.chunks(self.in_channels) {
            for c in 0..self.out_channels {
                self.scratch.push(frame[c.min(frame.len() - 1)]);
            }
        }
        &self.scratch
    }
}

impl TrackWriter for CpalWriter {
    fn write(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        let error_flag = self.error_flag.clone();
        let mut pending = self.remap(samples).to_vec();

        while !pending.is_empty() {
            if error_flag.load(Ordering::Relaxed) {
                return Err(AudioError::Write("output stream reported an error".to_string()));
            }

            let pushed = self.producer.push_slice(&pending);
            pending.drain(..pushed);

            if !pending.is_empty() {
                std::thread::sleep(FULL_RING_BACKOFF);
            }
        }
        Ok(())
    }
}

/// Pick a device configuration running at `sample_rate`, preferring the
/// track's channel count and f32 samples.
fn best_config(device: &Device, sample_rate: u32, channels: u16) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::CreateWriter(format!("Failed to get device configs: {}", e)))?
        .filter(|c| c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate)
        .collect();

    let score = |c: &cpal::SupportedStreamConfigRange| {
        let channel_match = c.channels() == channels;
        let format_match = c.sample_format() == SampleFormat::F32;
        (channel_match, format_match)
    };

    let best = configs
        .into_iter()
        .max_by_key(score)
        .ok_or_else(|| {
            AudioError::CreateWriter(format!("Device does not support {} Hz", sample_rate))
        })?;

    let sample_format = best.sample_format();
    let config = best.with_sample_rate(cpal::SampleRate(sample_rate)).config();
    Ok((config, sample_format))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
    volume: SoftwareVolume,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let gain = volume.gain();
                for out in data.iter_mut() {
                    // Underrun plays silence
                    let sample = consumer.try_pop().unwrap_or(0.0);
                    *out = T::from_sample((sample * gain).clamp(-1.0, 1.0));
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| AudioError::CreateWriter(format!("Failed to build stream: {}", e)))
}
