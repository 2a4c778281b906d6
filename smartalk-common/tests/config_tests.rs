//! Integration tests for analytics config resolution
//!
//! Tests cover:
//! - Priority order: explicit path > env var > platform dir > defaults
//! - Missing files fall back to defaults without failing
//! - Environment overrides for `enabled` and `base_url`
//!
//! Tests that touch SMARTALK_* environment variables are marked #[serial]
//! so they never run in parallel with each other.

use serial_test::serial;
use smartalk_common::config::{
    resolve_config_path, AnalyticsConfig, CONFIG_ENV_VAR, ENABLED_ENV_VAR, URL_ENV_VAR,
};
use smartalk_common::Error;
use std::env;
use std::fs;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(CONFIG_ENV_VAR);
    env::remove_var(ENABLED_ENV_VAR);
    env::remove_var(URL_ENV_VAR);
}

fn write_config(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).expect("write config");
    path
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let cli = write_config(&dir, "cli.toml", "batch_size = 20\n");
    let from_env = write_config(&dir, "env.toml", "batch_size = 30\n");
    env::set_var(CONFIG_ENV_VAR, &from_env);

    assert_eq!(resolve_config_path(Some(&cli)), Some(cli.clone()));
    let config = AnalyticsConfig::load(Some(&cli)).expect("load");
    assert_eq!(config.batch_size, 20);

    clear_env();
}

#[test]
#[serial]
fn test_env_path_used_without_cli_arg() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let from_env = write_config(&dir, "env.toml", "batch_size = 30\nmax_buffer_size = 300\n");
    env::set_var(CONFIG_ENV_VAR, &from_env);

    let config = AnalyticsConfig::load(None).expect("load");
    assert_eq!(config.batch_size, 30);
    assert_eq!(config.max_buffer_size, 300);

    clear_env();
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let config = AnalyticsConfig::load(Some(&missing)).expect("missing file is not fatal");
    assert_eq!(config, AnalyticsConfig::default());
}

#[test]
#[serial]
fn test_malformed_file_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let bad = write_config(&dir, "bad.toml", "enabled = \"sometimes\"\n");

    let result = AnalyticsConfig::load(Some(&bad));
    assert!(matches!(result, Err(Error::TomlParse(_))));
}

#[test]
#[serial]
fn test_invalid_values_fail_validation() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "zero.toml", "batch_size = 0\n");

    let result = AnalyticsConfig::load(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_overrides_apply_last() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "a.toml", "enabled = true\nbase_url = \"http://file.example\"\n");
    env::set_var(ENABLED_ENV_VAR, "false");
    env::set_var(URL_ENV_VAR, "https://collector.example/api/v1");

    let config = AnalyticsConfig::load(Some(&path)).expect("load");
    assert!(!config.enabled);
    assert_eq!(
        config.batch_endpoint(),
        "https://collector.example/api/v1/analytics/events/batch"
    );

    clear_env();
}

#[test]
#[serial]
fn test_bad_enabled_override_is_error() {
    clear_env();
    env::set_var(ENABLED_ENV_VAR, "perhaps");
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("none.toml");

    let result = AnalyticsConfig::load(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}
