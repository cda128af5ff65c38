//! Audio output using cpal
//!
//! `CpalSink` keeps one output stream running for the whole run. The stream
//! callback pulls frames from a single shared voice; with no voice loaded it
//! writes silence. Interrupting applies a fade-out envelope inside the
//! callback and returns once the envelope has reached zero.

use super::{AudioFrame, AudioSink, Resampler, SimpleDecoder, TrackBuffer};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use perchbox_common::FadeCurve;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Extra wait past the nominal fade length before forcing silence
const FADE_GRACE: Duration = Duration::from_millis(200);

/// List available audio output device names
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();
    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

struct Fade {
    total_frames: usize,
    elapsed: usize,
}

/// Playback position shared with the stream callback
#[derive(Default)]
struct Voice {
    buffer: Option<TrackBuffer>,
    position: usize,
    fade: Option<Fade>,
    finished: bool,
}

impl Voice {
    fn is_active(&self) -> bool {
        self.buffer.is_some() && !self.finished
    }

    fn next_frame(&mut self, curve: FadeCurve) -> AudioFrame {
        if !self.is_active() {
            return AudioFrame::zero();
        }
        let Some(frame) = self.buffer.as_ref().and_then(|b| b.frame(self.position)) else {
            self.finished = true;
            return AudioFrame::zero();
        };
        self.position += 1;

        match self.fade.as_mut() {
            None => frame,
            Some(fade) if fade.elapsed >= fade.total_frames => {
                self.finished = true;
                AudioFrame::zero()
            }
            Some(fade) => {
                let gain = curve.calculate_fade_out(fade.elapsed as f32 / fade.total_frames as f32);
                fade.elapsed += 1;
                frame.scaled(gain)
            }
        }
    }

    fn clear(&mut self) {
        self.buffer = None;
        self.position = 0;
        self.fade = None;
        self.finished = true;
    }
}

fn lock(voice: &Mutex<Voice>) -> MutexGuard<'_, Voice> {
    voice.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Output device sink backed by cpal
pub struct CpalSink {
    device: Device,
    device_name: String,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    voice: Arc<Mutex<Voice>>,
    pending: Option<TrackBuffer>,
    fade_curve: FadeCurve,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
}

impl CpalSink {
    /// Open the named device (falling back to the default) and start its stream
    pub fn open(device_name: Option<&str>, fade_curve: FadeCurve) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    Error::AudioOutput(format!("Failed to enumerate devices: {}", e))
                })?;
                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(device) => device,
                    None => {
                        warn!(
                            "Requested device '{}' not found, falling back to default device",
                            name
                        );
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        info!(
            "Audio device {}: {}Hz, {} channels, {:?}",
            device_name, config.sample_rate.0, config.channels, sample_format
        );

        let mut sink = Self {
            device,
            device_name,
            config,
            sample_format,
            stream: None,
            voice: Arc::new(Mutex::new(Voice::default())),
            pending: None,
            fade_curve,
            error_flag: Arc::new(AtomicBool::new(false)),
        };
        sink.start_stream()?;
        Ok(sink)
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start_stream(&mut self) -> Result<()> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>()?,
            SampleFormat::I16 => self.build_stream::<i16>()?,
            SampleFormat::U16 => self.build_stream::<u16>()?,
            SampleFormat::I32 => self.build_stream::<i32>()?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };
        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);
        self.error_flag.store(false, Ordering::SeqCst);
        debug!("Audio stream started on {}", self.device_name);
        Ok(())
    }

    fn build_stream<T>(&self) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = self.config.channels as usize;
        let voice = Arc::clone(&self.voice);
        let curve = self.fade_curve;
        let error_flag = Arc::clone(&self.error_flag);

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut voice = lock(&voice);
                    for frame in data.chunks_mut(channels) {
                        let audio = voice.next_frame(curve);
                        for (ch, sample) in frame.iter_mut().enumerate() {
                            let value = match ch {
                                0 => audio.left,
                                1 => audio.right,
                                _ => 0.0,
                            };
                            *sample = T::from_sample(value.clamp(-1.0, 1.0));
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Rebuild the stream after a device error
    fn recover_stream(&mut self) -> Result<()> {
        if !self.error_flag.load(Ordering::SeqCst) {
            return Ok(());
        }
        warn!("Restarting audio stream on {} after device error", self.device_name);
        self.stream = None;
        self.start_stream()
    }
}

impl AudioSink for CpalSink {
    fn load(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::TrackNotFound(path.to_path_buf()));
        }
        let decoded = SimpleDecoder::decode_file(path)?;
        let rate = self.sample_rate();
        let samples = Resampler::resample(&decoded.samples, decoded.sample_rate, rate, 2)?;
        let buffer = TrackBuffer::new(samples, rate);
        debug!(
            "Loaded {} ({} ms, {} source channels)",
            path.display(),
            buffer.duration_ms(),
            decoded.source_channels
        );
        self.pending = Some(buffer);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.recover_stream()?;
        let buffer = self
            .pending
            .take()
            .ok_or_else(|| Error::Playback("play called with no track loaded".to_string()))?;
        let mut voice = lock(&self.voice);
        voice.buffer = Some(buffer);
        voice.position = 0;
        voice.fade = None;
        voice.finished = false;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        lock(&self.voice).is_active()
    }

    fn fade_out(&mut self, duration: Duration) -> Result<()> {
        let total_frames =
            ((duration.as_secs_f64() * self.sample_rate() as f64).round() as usize).max(1);
        {
            let mut voice = lock(&self.voice);
            if !voice.is_active() {
                voice.clear();
                return Ok(());
            }
            voice.fade = Some(Fade {
                total_frames,
                elapsed: 0,
            });
        }

        let deadline = Instant::now() + duration + FADE_GRACE;
        while self.is_playing() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        if self.is_playing() {
            warn!("Fade-out did not finish within {:?}, cutting output", duration + FADE_GRACE);
        }
        self.stop();
        Ok(())
    }

    fn stop(&mut self) {
        self.pending = None;
        lock(&self.voice).clear();
    }
}
