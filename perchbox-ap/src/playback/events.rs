//! Messages between the decision loop and the playback worker

use crate::library::TrackId;
use crate::state::Category;
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

/// Identifier of an occupancy interval in the transition log
pub type IntervalId = u64;

/// Commands sent to the playback worker
#[derive(Debug)]
pub enum PlaybackCommand {
    /// Start (or keep) playing `category`; tracks are attributed to `interval`
    Authorize {
        category: Category,
        interval: IntervalId,
    },
    /// Fade out and go idle; `ack` fires once the sink is silent
    Interrupt { ack: oneshot::Sender<()> },
    /// Interrupt, then exit the worker thread
    Shutdown { ack: oneshot::Sender<()> },
}

/// Worker state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Playing,
    Interrupting,
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Loading => write!(f, "loading"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Interrupting => write!(f, "interrupting"),
        }
    }
}

/// Notifications from the playback worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    PhaseChanged(PlaybackPhase),

    /// A track began producing audio
    TrackStarted {
        interval: IntervalId,
        category: Category,
        track: TrackId,
    },

    /// A track could not be loaded or started and was passed over
    TrackSkipped {
        category: Category,
        track: TrackId,
        reason: String,
    },

    /// A track played to its end
    TrackFinished {
        interval: IntervalId,
        category: Category,
        track: TrackId,
    },
}

/// Worker timing
#[derive(Debug, Clone, Copy)]
pub struct PlaybackSettings {
    /// Fade applied when interrupting
    pub fade_out: Duration,
    /// Command wait between natural-completion checks
    pub poll_interval: Duration,
    /// Upper bound on waiting for an interrupt acknowledgement
    pub interrupt_timeout: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            fade_out: Duration::from_millis(50),
            poll_interval: Duration::from_millis(100),
            interrupt_timeout: Duration::from_millis(1000),
        }
    }
}
