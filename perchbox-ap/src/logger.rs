//! Transition log
//!
//! One CSV file per run, opened for appending. The first two lines are the
//! run's start stamp and the column header; every following line is one
//! closed occupancy interval:
//!
//! ```text
//! 2026/3/14,09:26:53.589
//! Stimulus,Start_time,End_time,Songs
//! free,09:26:53.601,09:26:55.012,[]
//! ran,09:26:55.012,09:27:02.330,"[song3.wav, song1.wav]"
//! ```
//!
//! Each record is formatted in full and written with a single `write_all`
//! followed by `flush`, so a crash loses at most the open interval.

use crate::error::{Error, Result};
use crate::library::TrackId;
use crate::playback::IntervalId;
use crate::state::{SemanticState, StateLabels};
use chrono::{DateTime, Utc};
use perchbox_common::time::{format_clock_ms, format_run_date};
use perchbox_common::RunCommand;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column header line
pub const HEADER: &str = "Stimulus,Start_time,End_time,Songs";

/// A closed occupancy interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub state: SemanticState,
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tracks: Vec<TrackId>,
}

impl TransitionRecord {
    /// Interval length in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    /// Format as one CSV line, including the line terminator
    pub fn to_csv_line(&self) -> String {
        let songs = format!("[{}]", self.tracks.join(", "));
        format!(
            "{},{},{},{}\n",
            csv_field(&self.label),
            format_clock_ms(&self.start),
            format_clock_ms(&self.end),
            csv_field(&songs)
        )
    }
}

/// Quote a field when it contains a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Debug)]
struct OpenInterval {
    id: IntervalId,
    state: SemanticState,
    start: DateTime<Utc>,
    tracks: Vec<TrackId>,
}

/// Append-only writer of occupancy intervals
pub struct TransitionLogger<W: Write> {
    writer: W,
    labels: StateLabels,
    open: Option<OpenInterval>,
    next_id: IntervalId,
    closed: usize,
}

impl TransitionLogger<File> {
    /// Open `<folder>/<run command>.csv` for appending and write the header
    ///
    /// Creates `folder` if needed.
    pub fn open_file(
        folder: &Path,
        run: &RunCommand,
        labels: StateLabels,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let path = log_path(folder, run);
        let file = std::fs::create_dir_all(folder)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(&path))
            .map_err(|source| Error::LogOpen {
                path: path.clone(),
                source,
            })?;

        let logger = Self::new(file, labels, started_at).map_err(|e| match e {
            Error::Io(source) => Error::LogOpen {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        info!("Logging transitions to {}", path.display());
        Ok(logger)
    }
}

/// Location of a run's log file
pub fn log_path(folder: &Path, run: &RunCommand) -> PathBuf {
    folder.join(run.log_file_name())
}

impl<W: Write> TransitionLogger<W> {
    /// Wrap `writer` and write the run header
    pub fn new(mut writer: W, labels: StateLabels, started_at: DateTime<Utc>) -> Result<Self> {
        let header = format!(
            "{},{}\n{}\n",
            format_run_date(&started_at),
            format_clock_ms(&started_at),
            HEADER
        );
        writer.write_all(header.as_bytes())?;
        writer.flush()?;

        Ok(Self {
            writer,
            labels,
            open: None,
            next_id: 1,
            closed: 0,
        })
    }

    /// Record a confirmed state change at `at`
    ///
    /// Closes and writes the open interval, if any, then opens a new one for
    /// `state`. The new interval is open even when writing the old one fails.
    pub fn transition(
        &mut self,
        state: SemanticState,
        at: DateTime<Utc>,
    ) -> Result<Option<TransitionRecord>> {
        let previous = self.open.take();

        let id = self.next_id;
        self.next_id += 1;
        self.open = Some(OpenInterval {
            id,
            state,
            start: at,
            tracks: Vec::new(),
        });
        debug!("Opened interval {} ({})", id, self.labels.label(state));

        match previous {
            Some(interval) => self.write_closed(interval, at).map(Some),
            None => Ok(None),
        }
    }

    /// Add a started track to interval `interval`
    ///
    /// Returns false (and drops the track) if `interval` is no longer open.
    pub fn append_track(&mut self, interval: IntervalId, track: &str) -> bool {
        match self.open.as_mut() {
            Some(open) if open.id == interval => {
                open.tracks.push(track.to_string());
                true
            }
            _ => {
                warn!(
                    "Track {} reported for interval {} which is no longer open",
                    track, interval
                );
                false
            }
        }
    }

    /// Close the open interval at `at` without opening another
    pub fn close(&mut self, at: DateTime<Utc>) -> Result<Option<TransitionRecord>> {
        match self.open.take() {
            Some(interval) => self.write_closed(interval, at).map(Some),
            None => Ok(None),
        }
    }

    /// Id of the open interval
    pub fn current_interval(&self) -> Option<IntervalId> {
        self.open.as_ref().map(|o| o.id)
    }

    pub fn current_state(&self) -> Option<SemanticState> {
        self.open.as_ref().map(|o| o.state)
    }

    /// Records written so far
    pub fn closed_count(&self) -> usize {
        self.closed
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_closed(
        &mut self,
        interval: OpenInterval,
        at: DateTime<Utc>,
    ) -> Result<TransitionRecord> {
        let record = TransitionRecord {
            state: interval.state,
            label: self.labels.label(interval.state).to_string(),
            start: interval.start,
            end: at,
            tracks: interval.tracks,
        };

        self.writer.write_all(record.to_csv_line().as_bytes())?;
        self.writer.flush()?;
        self.closed += 1;

        info!(
            "Closed {} interval: {} ms, {} track(s)",
            record.label,
            record.duration_ms(),
            record.tracks.len()
        );
        Ok(record)
    }
}
