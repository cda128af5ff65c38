//! # perchbox apparatus library (perchbox-ap)
//!
//! Drives a perch-preference apparatus: a beam-break sensor reports which
//! perch is occupied, the perch's category decides which stimulus set plays
//! (or silence), and every occupancy interval is logged with the tracks
//! played during it.
//!
//! **Architecture:** sensor thread -> latest-code mailbox -> decision loop
//! (mapping + debounce) -> playback worker thread (symphonia + rubato + cpal)
//! and CSV transition log.

pub mod apparatus;
pub mod audio;
pub mod debounce;
pub mod error;
pub mod library;
pub mod logger;
pub mod playback;
pub mod sensor;
pub mod state;

pub use apparatus::{Apparatus, ApparatusSettings, RunSummary};
pub use error::{Error, Result};
