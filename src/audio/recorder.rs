//! Microphone recording using CPAL (Cross-Platform Audio Library)
//!
//! Supports device enumeration and fixed-duration takes buffered in memory.

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use hound::{WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Audio recording device with configuration
pub struct AudioRecorder {
    device: Device,
    config: StreamConfig,
    sample_rate: u32,
}

/// Information about an available audio input device
#[derive(Debug)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub supported_sample_rates: Vec<u32>,
    pub supported_formats: Vec<SampleFormat>,
}

/// One completed recording: raw mono samples plus the rate they were captured at
#[derive(Debug, Clone)]
pub struct Take {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioRecorder {
    /// Create a recorder on the default input device, as close to the target
    /// sample rate as the device allows
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default input device found"))?;

        let config = Self::get_optimal_config(&device, sample_rate)?;
        let sample_rate = config.sample_rate.0;

        Ok(Self {
            device,
            config,
            sample_rate,
        })
    }

    /// Find the supported configuration closest to the target sample rate
    fn get_optimal_config(device: &Device, target_sample_rate: u32) -> Result<StreamConfig> {
        let supported_configs = device.supported_input_configs()?;

        let mut best_config = None;
        let mut best_diff = u32::MAX;

        for config in supported_configs {
            let diff = config.max_sample_rate().0.abs_diff(target_sample_rate);
            if diff < best_diff {
                best_diff = diff;
                best_config = Some(config);
            }
        }

        let config =
            best_config.ok_or_else(|| anyhow!("No suitable audio configuration found"))?;

        let rate = target_sample_rate.clamp(config.min_sample_rate().0, config.max_sample_rate().0);
        Ok(config.with_sample_rate(cpal::SampleRate(rate)).into())
    }

    /// List all available audio input devices
    pub fn list_devices() -> Result<Vec<AudioDeviceInfo>> {
        let host = cpal::default_host();
        let devices = host.input_devices()?;
        let default_device = host.default_input_device();

        let mut device_infos = Vec::new();

        for device in devices {
            let name = device.name().unwrap_or("Unknown Device".to_string());
            let is_default = default_device
                .as_ref()
                .map(|d| d.name().unwrap_or_default() == name)
                .unwrap_or(false);

            let supported_sample_rates = device
                .supported_input_configs()?
                .map(|c| c.max_sample_rate().0)
                .collect();

            let supported_formats = device
                .supported_input_configs()?
                .map(|c| c.sample_format())
                .collect();

            device_infos.push(AudioDeviceInfo {
                name,
                is_default,
                supported_sample_rates,
                supported_formats,
            });
        }

        Ok(device_infos)
    }

    /// Record one take (blocking)
    ///
    /// Captures until `max_duration` elapses or `stop` is raised. `on_tick`
    /// fires once per whole second of remaining time so the caller can drive a
    /// countdown. Returning tears down the stream, the deadline, and the
    /// countdown together, so a finished take cannot fire into a later one.
    pub fn record_take(
        &self,
        max_duration: Duration,
        stop: Arc<AtomicBool>,
        mut on_tick: impl FnMut(u64),
    ) -> Result<Take> {
        let buffer = Arc::new(Mutex::new(Vec::<i16>::new()));
        let buffer_clone = buffer.clone();
        let stop_clone = stop.clone();
        let stop_on_error = stop.clone();

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if stop_clone.load(Ordering::Acquire) {
                    return;
                }

                if let Ok(mut buffer) = buffer_clone.lock() {
                    for &sample in data {
                        buffer.push((sample * i16::MAX as f32) as i16);
                    }
                }
            },
            move |err| {
                eprintln!("Audio device disconnected or stream error: {}", err);
                stop_on_error.store(true, Ordering::Release);
            },
            None,
        )?;

        stream.play()?;

        let started = Instant::now();
        let mut last_tick = remaining_secs(max_duration, Duration::ZERO);
        on_tick(last_tick);

        loop {
            let elapsed = started.elapsed();
            if elapsed >= max_duration || stop.load(Ordering::Acquire) {
                break;
            }

            let remaining = remaining_secs(max_duration, elapsed);
            if remaining != last_tick {
                last_tick = remaining;
                on_tick(remaining);
            }

            std::thread::sleep(Duration::from_millis(100));
        }

        drop(stream);

        let samples = match buffer.lock() {
            Ok(mut samples) => std::mem::take(&mut *samples),
            Err(_) => return Err(anyhow!("Audio buffer lock poisoned")),
        };

        Ok(Take {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

/// Whole seconds left in the window, rounded up
fn remaining_secs(max_duration: Duration, elapsed: Duration) -> u64 {
    let remaining = max_duration.saturating_sub(elapsed);
    if remaining.subsec_nanos() > 0 {
        remaining.as_secs() + 1
    } else {
        remaining.as_secs()
    }
}

impl Take {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Render the take as 16-bit mono PCM WAV bytes for upload
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, self.wav_spec())?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Write the take to a WAV file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = WavWriter::create(path, self.wav_spec())?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAV_HEADER_BYTES: usize = 44;

    fn take_of(samples: Vec<i16>) -> Take {
        Take {
            samples,
            sample_rate: 16000,
        }
    }

    #[test]
    fn test_take_wav_bytes_non_empty_when_samples_captured() {
        let take = take_of(vec![0, 1000, -1000, 32000]);
        let wav = take.to_wav_bytes().unwrap();
        assert_eq!(wav.len(), WAV_HEADER_BYTES + 4 * 2);
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }

    #[test]
    fn test_empty_take_is_flagged() {
        let take = take_of(Vec::new());
        assert!(take.is_empty());
        assert_eq!(take.duration(), Duration::ZERO);
    }

    #[test]
    fn test_take_duration_matches_sample_count() {
        let take = take_of(vec![0; 16000 * 5]);
        assert_eq!(take.duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_remaining_secs_rounds_up() {
        let window = Duration::from_secs(5);
        assert_eq!(remaining_secs(window, Duration::ZERO), 5);
        assert_eq!(remaining_secs(window, Duration::from_millis(100)), 5);
        assert_eq!(remaining_secs(window, Duration::from_millis(1001)), 4);
        assert_eq!(remaining_secs(window, Duration::from_secs(5)), 0);
        assert_eq!(remaining_secs(window, Duration::from_secs(9)), 0);
    }
}
