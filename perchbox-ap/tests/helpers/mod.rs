//! Test helpers for perchbox-ap integration tests
//!
//! - ScriptedSensor: replays a timeline of sensor lines
//! - MockSink: audio sink that records what was played, without a device
//! - audio_generator: WAV fixtures for decoder tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod mock_sink;
pub mod scripted_sensor;

pub use mock_sink::{MockSink, MockSinkState};
pub use scripted_sensor::ScriptedSensor;

use perchbox_ap::library::{StimulusLibraries, StimulusLibrary};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Libraries with `count` made-up tracks per category
pub fn fake_libraries(count: usize, seed: u64) -> StimulusLibraries {
    let tracks = |prefix: &str| (1..=count).map(|i| format!("{}{}.wav", prefix, i)).collect();
    StimulusLibraries::new(
        StimulusLibrary::new("/stimulus/ran", tracks("ran"), StdRng::seed_from_u64(seed)),
        StimulusLibrary::new("/stimulus/reg", tracks("reg"), StdRng::seed_from_u64(seed + 1)),
    )
}
