//! Stimulus track pools
//!
//! Each category owns one library. Tracks are drawn from a shuffled order
//! without repetition until every track has been played once (a cycle), then
//! the order is reshuffled. Partial cycles survive interruptions: a track
//! that was started is spent even if its playback was cut short.

use crate::error::{Error, Result};
use crate::state::Category;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of a track inside its category folder
pub type TrackId = String;

/// Extensions accepted as stimulus tracks (compared case-insensitively)
const AUDIO_EXTENSIONS: [&str; 7] = ["wav", "mp3", "flac", "ogg", "m4a", "aac", "mp4"];

/// Shuffle-without-repeat track pool for one category
#[derive(Debug)]
pub struct StimulusLibrary {
    folder: PathBuf,
    tracks: Vec<TrackId>,
    /// Indices into `tracks`, current cycle order
    order: Vec<usize>,
    played: HashSet<usize>,
    /// Last track handed out, used to avoid a repeat across the cycle boundary
    last_played: Option<usize>,
    rng: StdRng,
}

impl StimulusLibrary {
    /// Build a library from explicit track names
    pub fn new(folder: impl Into<PathBuf>, tracks: Vec<TrackId>, rng: StdRng) -> Self {
        let mut library = Self {
            folder: folder.into(),
            order: (0..tracks.len()).collect(),
            tracks,
            played: HashSet::new(),
            last_played: None,
            rng,
        };
        library.order.shuffle(&mut library.rng);
        library
    }

    /// Enumerate `folder` and build its library
    ///
    /// A folder that cannot be read is an error. An empty folder, or a track
    /// count different from `expected`, is only reported.
    pub fn from_folder(folder: &Path, expected: Option<usize>, rng: StdRng) -> Result<Self> {
        let tracks = scan_folder(folder)?;

        if tracks.is_empty() {
            warn!(
                "Stimulus folder {} has no audio tracks; this category will stay silent",
                folder.display()
            );
        } else if let Some(expected) = expected.filter(|n| *n != tracks.len()) {
            warn!(
                "Stimulus folder {} has {} tracks, expected {}",
                folder.display(),
                tracks.len(),
                expected
            );
        }

        info!("Loaded {} tracks from {}", tracks.len(), folder.display());
        Ok(Self::new(folder, tracks, rng))
    }

    /// Seed from entropy for production runs
    pub fn entropy_rng() -> StdRng {
        StdRng::from_entropy()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Number of tracks already played in the current cycle
    pub fn played_count(&self) -> usize {
        self.played.len()
    }

    /// Full path of a track
    pub fn path_of(&self, track: &str) -> PathBuf {
        self.folder.join(track)
    }

    /// Next track to play
    ///
    /// Returns the first unplayed track of the current order. When the cycle
    /// is complete the order is reshuffled first. `None` only when empty.
    pub fn next(&mut self) -> Option<TrackId> {
        if self.tracks.is_empty() {
            return None;
        }

        if self.played.len() >= self.tracks.len() {
            self.start_cycle();
        }

        self.order
            .iter()
            .find(|idx| !self.played.contains(*idx))
            .map(|idx| self.tracks[*idx].clone())
    }

    /// Record that `track` was started in this cycle
    pub fn mark_played(&mut self, track: &str) {
        match self.tracks.iter().position(|t| t == track) {
            Some(idx) => {
                self.played.insert(idx);
                self.last_played = Some(idx);
            }
            None => warn!("mark_played for unknown track {}", track),
        }
    }

    /// Reshuffle and forget the played set
    pub fn reset(&mut self) {
        self.order.shuffle(&mut self.rng);
        self.played.clear();
    }

    fn start_cycle(&mut self) {
        self.reset();

        // Keep the previous cycle's last track away from the front
        if self.order.len() > 1 && self.order.first() == self.last_played.as_ref() {
            let swap_with = self.rng.gen_range(1..self.order.len());
            self.order.swap(0, swap_with);
        }

        debug!(
            "New stimulus cycle for {}: {:?}",
            self.folder.display(),
            self.order.iter().map(|i| &self.tracks[*i]).collect::<Vec<_>>()
        );
    }
}

/// The two category libraries, owned together by the playback worker
#[derive(Debug)]
pub struct StimulusLibraries {
    pub a: StimulusLibrary,
    pub b: StimulusLibrary,
}

impl StimulusLibraries {
    pub fn new(a: StimulusLibrary, b: StimulusLibrary) -> Self {
        Self { a, b }
    }

    pub fn get(&self, category: Category) -> &StimulusLibrary {
        match category {
            Category::A => &self.a,
            Category::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut StimulusLibrary {
        match category {
            Category::A => &mut self.a,
            Category::B => &mut self.b,
        }
    }
}

/// List audio files in `folder`, sorted by name
///
/// Only regular, non-hidden files with a known audio extension are kept.
pub fn scan_folder(folder: &Path) -> Result<Vec<TrackId>> {
    let entries = std::fs::read_dir(folder).map_err(|e| folder_error(folder, e))?;

    let mut tracks = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| folder_error(folder, e))?;
        let file_type = entry.file_type().map_err(|e| folder_error(folder, e))?;
        if !file_type.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 file name in {}", folder.display());
            continue;
        };
        if name.starts_with('.') || !is_audio_file(Path::new(&name)) {
            continue;
        }
        tracks.push(name);
    }

    tracks.sort();
    Ok(tracks)
}

fn folder_error(folder: &Path, e: std::io::Error) -> Error {
    Error::Library(format!(
        "cannot read stimulus folder {}: {}",
        folder.display(),
        e
    ))
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
