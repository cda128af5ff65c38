//! Core audio data types
//!
//! A stimulus track is short, so it is decoded completely into RAM before
//! playback starts. All buffers are interleaved stereo f32.

/// Decoded track ready for the output device
#[derive(Debug, Clone)]
pub struct TrackBuffer {
    /// PCM samples, interleaved stereo: [L, R, L, R, ...]
    pub samples: Vec<f32>,

    /// Sample rate of `samples` (the device rate after resampling)
    pub sample_rate: u32,

    /// Number of stereo frames
    pub frame_count: usize,
}

impl TrackBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let frame_count = samples.len() / 2;
        Self {
            samples,
            sample_rate,
            frame_count,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frame_count as u64 * 1000) / self.sample_rate as u64
    }

    /// Frame at `index`, or None past the end
    pub fn frame(&self, index: usize) -> Option<AudioFrame> {
        let i = index * 2;
        if i + 1 < self.samples.len() {
            Some(AudioFrame {
                left: self.samples[i],
                right: self.samples[i + 1],
            })
        } else {
            None
        }
    }
}

/// One stereo sample pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrame {
    pub left: f32,
    pub right: f32,
}

impl AudioFrame {
    pub fn zero() -> Self {
        AudioFrame {
            left: 0.0,
            right: 0.0,
        }
    }

    /// Scale both channels by `gain`
    pub fn scaled(self, gain: f32) -> Self {
        AudioFrame {
            left: self.left * gain,
            right: self.right * gain,
        }
    }
}
