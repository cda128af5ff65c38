//! Sensor that replays a fixed timeline
//!
//! Each step is a protocol line and how long the bird stays there. The
//! current line is reported every few milliseconds, the way the sensor board
//! repeats its state; after the last step its line is held.

use perchbox_ap::sensor::{RawCode, SensorLink};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Interval between repeated reports
const REPORT_PERIOD: Duration = Duration::from_millis(5);

pub struct ScriptedSensor {
    steps: Vec<(&'static str, Duration)>,
    started: Arc<Mutex<Option<Instant>>>,
}

impl ScriptedSensor {
    /// Timeline of `(line, hold)` steps
    pub fn new(steps: &[(&'static str, u64)]) -> Self {
        Self {
            steps: steps
                .iter()
                .map(|(line, ms)| (*line, Duration::from_millis(*ms)))
                .collect(),
            started: Arc::new(Mutex::new(None)),
        }
    }

    /// Instant of the first poll, shared with the test
    pub fn start_marker(&self) -> Arc<Mutex<Option<Instant>>> {
        Arc::clone(&self.started)
    }

    /// Length of the whole timeline
    pub fn total(&self) -> Duration {
        self.steps.iter().map(|(_, hold)| *hold).sum()
    }

    fn line_at(&self, elapsed: Duration) -> Option<&'static str> {
        let mut end = Duration::ZERO;
        for (line, hold) in &self.steps {
            end += *hold;
            if elapsed < end {
                return Some(line);
            }
        }
        self.steps.last().map(|(line, _)| *line)
    }
}

impl SensorLink for ScriptedSensor {
    fn poll(&mut self) -> Option<RawCode> {
        let started = *self
            .started
            .lock()
            .unwrap()
            .get_or_insert_with(Instant::now);
        thread::sleep(REPORT_PERIOD);
        self.line_at(started.elapsed()).map(RawCode::parse_line)
    }
}
