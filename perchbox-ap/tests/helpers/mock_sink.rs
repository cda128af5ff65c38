//! Audio sink double
//!
//! Tracks "play" for a fixed length of wall time. Everything the playback
//! worker does to the sink is recorded in a shared [`MockSinkState`].

use perchbox_ap::audio::AudioSink;
use perchbox_ap::error::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct MockSinkState {
    /// Every load attempt, failed ones included
    pub loads: Vec<PathBuf>,
    /// Track file names in start order, with their start instant
    pub starts: Vec<(String, Instant)>,
    pub fade_outs: usize,
    /// `play` calls made while a track was still sounding
    pub overlaps: usize,
}

impl MockSinkState {
    pub fn started_names(&self) -> Vec<String> {
        self.starts.iter().map(|(name, _)| name.clone()).collect()
    }
}

pub struct MockSink {
    state: Arc<Mutex<MockSinkState>>,
    track_length: Duration,
    failing: HashSet<String>,
    loaded: Option<PathBuf>,
    playing_until: Option<Instant>,
}

impl MockSink {
    /// Sink whose tracks last `track_length`; returns the shared record too
    pub fn new(track_length: Duration) -> (Self, Arc<Mutex<MockSinkState>>) {
        let state = Arc::new(Mutex::new(MockSinkState::default()));
        (
            Self {
                state: Arc::clone(&state),
                track_length,
                failing: HashSet::new(),
                loaded: None,
                playing_until: None,
            },
            state,
        )
    }

    /// Make loading these file names fail
    pub fn failing(mut self, names: &[&str]) -> Self {
        self.failing = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl AudioSink for MockSink {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.state.lock().unwrap().loads.push(path.to_path_buf());
        if self.failing.contains(&file_name(path)) {
            return Err(Error::Decode(format!("corrupt file {}", path.display())));
        }
        self.loaded = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let path = self
            .loaded
            .take()
            .ok_or_else(|| Error::Playback("nothing loaded".into()))?;
        let mut state = self.state.lock().unwrap();
        if self.is_playing() {
            state.overlaps += 1;
        }
        let now = Instant::now();
        state.starts.push((file_name(&path), now));
        self.playing_until = Some(now + self.track_length);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing_until.is_some_and(|until| Instant::now() < until)
    }

    fn fade_out(&mut self, duration: Duration) -> Result<()> {
        self.state.lock().unwrap().fade_outs += 1;
        if self.is_playing() {
            thread::sleep(duration);
        }
        self.playing_until = None;
        Ok(())
    }

    fn stop(&mut self) {
        self.loaded = None;
        self.playing_until = None;
    }
}
