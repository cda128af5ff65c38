//! # perchbox Common Library
//!
//! Shared code for the perch-preference apparatus:
//! - Error types
//! - TOML bootstrap configuration and its resolution order
//! - Run command / perch setting parsing
//! - Log timestamp formatting
//! - Fade curve definitions for interrupting playback

pub mod config;
pub mod error;
pub mod fade_curves;
pub mod run_command;
pub mod time;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use run_command::{RunCommand, Setting, SettingLetter};
