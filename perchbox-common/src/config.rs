//! Bootstrap configuration loading and resolution
//!
//! Static configuration (serial port, stimulus folders and labels, timing)
//! lives in a TOML file. The file is located in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `PERCHBOX_CONFIG` environment variable
//! 3. User config file (`<config dir>/perchbox/config.toml`)
//! 4. Compiled defaults (no file)
//!
//! A file that was named explicitly (1 or 2) must exist. A missing user
//! config file only produces a warning.

use crate::{Error, FadeCurve, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PERCHBOX_CONFIG";

/// State labels reserved for the non-stimulus states
const RESERVED_LABELS: [&str; 2] = ["silent", "free"];

/// Complete bootstrap configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Base folder for relative `log_folder` and stimulus folders
    pub root_folder: PathBuf,

    /// Folder receiving one transition log per run
    pub log_folder: PathBuf,

    /// Output device name (None = system default)
    pub audio_device: Option<String>,

    pub sensor: SensorConfig,
    pub stimulus: StimulusConfig,
    pub timing: TimingConfig,
    pub logging: LoggingConfig,
}

/// Serial link to the perch sensor board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Serial port name (`COM4`, `/dev/ttyACM0`)
    pub port: String,
    pub baud_rate: u32,
    /// Bounded wait of a single sensor poll
    pub poll_timeout_ms: u64,
}

/// Stimulus categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub a_label: String,
    pub a_folder: PathBuf,
    pub b_label: String,
    pub b_folder: PathBuf,
    /// Number of tracks each folder is expected to hold; a mismatch is reported
    pub expected_tracks: Option<usize>,
}

/// Debounce and playback timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Dwell on a stimulus perch before playback starts (0 = immediately)
    pub threshold_ms: u64,
    /// Length of the fade-out applied when playback is interrupted
    pub fade_out_ms: u64,
    pub fade_curve: FadeCurve,
    /// Decision loop re-evaluation period when no new sensor data arrives
    pub loop_tick_ms: u64,
    /// Completion poll period of the playback worker
    pub playback_poll_ms: u64,
    /// Upper bound on waiting for an interrupt to settle
    pub interrupt_timeout_ms: u64,
}

/// Diagnostic logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: PathBuf::from("."),
            log_folder: PathBuf::from("LOGS"),
            audio_device: None,
            sensor: SensorConfig::default(),
            stimulus: StimulusConfig::default(),
            timing: TimingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        let port = if cfg!(target_os = "windows") {
            "COM4"
        } else if cfg!(target_os = "macos") {
            "/dev/cu.usbmodem1101"
        } else {
            "/dev/ttyACM0"
        };
        Self {
            port: port.to_string(),
            baud_rate: 9600,
            poll_timeout_ms: 250,
        }
    }
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            a_label: "ran".to_string(),
            a_folder: PathBuf::from("stimulus/ran"),
            b_label: "reg".to_string(),
            b_folder: PathBuf::from("stimulus/reg"),
            expected_tracks: Some(5),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            threshold_ms: 300,
            fade_out_ms: 50,
            fade_curve: FadeCurve::Logarithmic,
            loop_tick_ms: 10,
            playback_poll_ms: 100,
            interrupt_timeout_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TomlConfig = toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content).map_err(|source| Error::ConfigParse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let a = self.stimulus.a_label.trim();
        let b = self.stimulus.b_label.trim();
        if a.is_empty() || b.is_empty() {
            return Err(Error::Config("stimulus labels must not be empty".to_string()));
        }
        if a.eq_ignore_ascii_case(b) {
            return Err(Error::Config(format!(
                "stimulus labels must differ (both are '{}')",
                a
            )));
        }
        for label in [a, b] {
            if RESERVED_LABELS.iter().any(|r| r.eq_ignore_ascii_case(label)) {
                return Err(Error::Config(format!(
                    "stimulus label '{}' is reserved",
                    label
                )));
            }
        }
        if self.sensor.port.trim().is_empty() {
            return Err(Error::Config("sensor port must not be empty".to_string()));
        }
        if self.sensor.baud_rate == 0 {
            return Err(Error::Config("sensor baud_rate must be positive".to_string()));
        }
        if self.sensor.poll_timeout_ms == 0 {
            return Err(Error::Config("sensor poll_timeout_ms must be positive".to_string()));
        }
        if self.timing.loop_tick_ms == 0 || self.timing.playback_poll_ms == 0 {
            return Err(Error::Config(
                "timing loop_tick_ms and playback_poll_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a configured path against `root_folder`
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_folder.join(path)
        }
    }

    pub fn log_folder_path(&self) -> PathBuf {
        self.resolve_path(&self.log_folder)
    }

    pub fn a_folder_path(&self) -> PathBuf {
        self.resolve_path(&self.stimulus.a_folder)
    }

    pub fn b_folder_path(&self) -> PathBuf {
        self.resolve_path(&self.stimulus.b_folder)
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserFile(PathBuf),
    CompiledDefaults,
}

/// Locates and loads the bootstrap configuration
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Find the config file to use, without reading it
    pub fn locate(&self) -> ConfigSource {
        if let Some(path) = &self.cli_path {
            return ConfigSource::CommandLine(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }

        if let Some(path) = user_config_path() {
            if path.exists() {
                return ConfigSource::UserFile(path);
            }
        }

        ConfigSource::CompiledDefaults
    }

    /// Load the effective configuration
    pub fn resolve(&self) -> Result<(TomlConfig, ConfigSource)> {
        let source = self.locate();
        let config = match &source {
            ConfigSource::CommandLine(path)
            | ConfigSource::Environment(path)
            | ConfigSource::UserFile(path) => {
                let config = TomlConfig::load(path)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            ConfigSource::CompiledDefaults => {
                warn!("No config file found, using compiled defaults");
                TomlConfig::default()
            }
        };

        Ok((config, source))
    }
}

/// Platform user config file location
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("perchbox").join("config.toml"))
}
