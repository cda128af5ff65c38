//! Common error types for perchbox

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for perchbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the apparatus crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for our schema
    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid operator input (run command, perch setting)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
