//! Audio subsystem
//!
//! Decoding (symphonia), resampling (rubato) and device output (cpal) behind
//! the [`AudioSink`] seam used by the playback worker.

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod types;

pub use decoder::{DecodedAudio, SimpleDecoder};
pub use output::{list_devices, CpalSink};
pub use resampler::Resampler;
pub use types::{AudioFrame, TrackBuffer};

use crate::error::Result;
use std::path::Path;
use std::time::Duration;

/// Single-voice output device
///
/// Implementations may be `!Send` (cpal streams are); the playback worker
/// builds its sink on its own thread.
pub trait AudioSink {
    /// Decode `path` and hold it ready for `play`
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Start the loaded track from the beginning
    fn play(&mut self) -> Result<()>;

    /// Whether a started track is still producing audio
    fn is_playing(&self) -> bool;

    /// Fade the current track to silence, returning once it is silent
    fn fade_out(&mut self, duration: Duration) -> Result<()>;

    /// Silence immediately and drop any loaded track
    fn stop(&mut self);
}
