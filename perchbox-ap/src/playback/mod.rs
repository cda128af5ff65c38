//! Stimulus playback worker and its message types

pub mod controller;
pub mod events;

pub use controller::PlaybackController;
pub use events::{IntervalId, PlaybackCommand, PlaybackEvent, PlaybackPhase, PlaybackSettings};
