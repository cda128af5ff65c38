//! Dwell debounce between occupancy and playback
//!
//! The gate has two outputs with different authority:
//! - **Transitions** are reported on the first observation of a new state,
//!   so the log keeps full occupancy granularity.
//! - **Authorization** to play is granted only after a stimulus state has
//!   persisted unbroken for the dwell threshold, once per landing.
//!
//! Dwell timing restarts only on a true transition. Repeated observations of
//! the current state never push authorization back.

use crate::state::{Category, SemanticState};
use std::time::{Duration, Instant};

/// A change of confirmed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Previous confirmed state (None before the first observation)
    pub from: Option<SemanticState>,
    pub to: SemanticState,
}

/// Result of feeding one observation to the gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateOutput {
    pub transition: Option<Transition>,
    pub authorize: Option<Category>,
}

/// Debounce state machine
#[derive(Debug, Clone)]
pub struct DebounceGate {
    threshold: Duration,
    confirmed: Option<SemanticState>,
    landed_at: Option<Instant>,
    authorized: bool,
}

impl DebounceGate {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            confirmed: None,
            landed_at: None,
            authorized: false,
        }
    }

    /// Current confirmed state
    pub fn confirmed(&self) -> Option<SemanticState> {
        self.confirmed
    }

    /// Whether playback was already authorized for the current landing
    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Feed one observation taken at `now`
    pub fn observe(&mut self, state: SemanticState, now: Instant) -> GateOutput {
        let mut output = GateOutput::default();

        if state == SemanticState::Unknown {
            return output;
        }

        if self.confirmed != Some(state) {
            output.transition = Some(Transition {
                from: self.confirmed,
                to: state,
            });
            self.confirmed = Some(state);
            self.landed_at = Some(now);
            self.authorized = false;
        }

        if let (Some(category), Some(landed_at)) = (state.category(), self.landed_at) {
            if !self.authorized && now.saturating_duration_since(landed_at) >= self.threshold {
                self.authorized = true;
                output.authorize = Some(category);
            }
        }

        output
    }
}
