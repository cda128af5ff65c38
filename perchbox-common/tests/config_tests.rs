//! Configuration resolution tests
//!
//! Covers config file priority (CLI > environment > user file > defaults),
//! graceful fallback to compiled defaults, and error reporting for unreadable
//! or malformed files.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PERCHBOX_CONFIG are marked with #[serial].

use perchbox_common::config::{ConfigResolver, ConfigSource, TomlConfig, CONFIG_ENV_VAR};
use perchbox_common::{Error, FadeCurve};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

const SAMPLE_CONFIG: &str = r#"
root_folder = "/srv/preference"
log_folder = "LOGS"
audio_device = "USB Audio"

[sensor]
port = "COM4"
baud_rate = 9600
poll_timeout_ms = 250

[stimulus]
a_label = "ran"
a_folder = "stimulus/ran"
b_label = "reg"
b_folder = "stimulus/reg"
expected_tracks = 5

[timing]
threshold_ms = 300
fade_out_ms = 80
fade_curve = "equal_power"

[logging]
level = "debug"
"#;

fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "config.toml", SAMPLE_CONFIG);

    let config = TomlConfig::load(&path).unwrap();

    assert_eq!(config.root_folder, PathBuf::from("/srv/preference"));
    assert_eq!(config.audio_device.as_deref(), Some("USB Audio"));
    assert_eq!(config.sensor.port, "COM4");
    assert_eq!(config.timing.fade_out_ms, 80);
    assert_eq!(config.timing.fade_curve, FadeCurve::EqualPower);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.b_folder_path(), PathBuf::from("/srv/preference/stimulus/reg"));
}

#[test]
fn test_load_missing_file_is_read_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    match TomlConfig::load(&path) {
        Err(Error::ConfigRead { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected ConfigRead, got {:?}", other),
    }
}

#[test]
fn test_load_malformed_file_names_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "broken.toml", "[sensor\nport = ");

    match TomlConfig::load(&path) {
        Err(Error::ConfigParse { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected ConfigParse, got {:?}", other),
    }
}

#[test]
fn test_load_rejects_wrong_types() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "typed.toml", "[timing]\nthreshold_ms = \"fast\"\n");
    assert!(matches!(TomlConfig::load(&path), Err(Error::ConfigParse { .. })));
}

#[test]
#[serial]
fn test_cli_path_wins_over_environment() {
    let dir = TempDir::new().unwrap();
    let cli = write_config(&dir, "cli.toml", "[timing]\nthreshold_ms = 111\n");
    let envp = write_config(&dir, "env.toml", "[timing]\nthreshold_ms = 222\n");
    env::set_var(CONFIG_ENV_VAR, &envp);

    let (config, source) = ConfigResolver::new(Some(cli.clone())).resolve().unwrap();

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(source, ConfigSource::CommandLine(cli));
    assert_eq!(config.timing.threshold_ms, 111);
}

#[test]
#[serial]
fn test_environment_path_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let envp = write_config(&dir, "env.toml", "[timing]\nthreshold_ms = 222\n");
    env::set_var(CONFIG_ENV_VAR, &envp);

    let (config, source) = ConfigResolver::new(None).resolve().unwrap();

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(source, ConfigSource::Environment(envp));
    assert_eq!(config.timing.threshold_ms, 222);
}

#[test]
#[serial]
fn test_explicit_missing_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    env::set_var(CONFIG_ENV_VAR, dir.path().join("nope.toml"));

    let result = ConfigResolver::new(None).resolve();

    env::remove_var(CONFIG_ENV_VAR);
    assert!(matches!(result, Err(Error::ConfigRead { .. })));
}

#[test]
#[serial]
fn test_blank_environment_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "  ");
    let source = ConfigResolver::new(None).locate();
    env::remove_var(CONFIG_ENV_VAR);

    assert!(!matches!(source, ConfigSource::Environment(_)));
}
