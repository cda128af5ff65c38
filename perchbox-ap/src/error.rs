//! Error types for perchbox-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for perchbox-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration or operator input errors from the common crate
    #[error(transparent)]
    Common(#[from] perchbox_common::Error),

    /// Serial channel to the sensor board could not be opened
    #[error("Failed to open sensor port {port}: {source}")]
    SensorOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Stimulus folder missing or unreadable
    #[error("Stimulus library error: {0}")]
    Library(String),

    /// Transition log could not be opened for appending
    #[error("Failed to open transition log {path}: {source}")]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Track file does not exist
    #[error("Track not found: {0}")]
    TrackNotFound(PathBuf),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback worker errors
    #[error("Playback error: {0}")]
    Playback(String),
}

impl Error {
    /// Process exit status for a fatal startup error
    ///
    /// 2 = configuration, 3 = sensor hardware, 4 = transition log,
    /// 5 = audio device, 1 = anything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Common(_) | Error::Library(_) => 2,
            Error::SensorOpen { .. } => 3,
            Error::LogOpen { .. } => 4,
            Error::AudioOutput(_) => 5,
            _ => 1,
        }
    }
}

/// Convenience Result type using perchbox-ap Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_startup_failure() {
        let config = Error::Common(perchbox_common::Error::InvalidInput("x".into()));
        let log = Error::LogOpen {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let audio = Error::AudioOutput("no device".into());

        assert_eq!(config.exit_code(), 2);
        assert_eq!(Error::Library("missing".into()).exit_code(), 2);
        assert_eq!(log.exit_code(), 4);
        assert_eq!(audio.exit_code(), 5);
        assert_eq!(Error::Playback("gone".into()).exit_code(), 1);
    }
}
