//! Config file discovery, TOML loading and secret resolution
//!
//! Tests that touch environment variables are marked #[serial].

use scenematch_common::config::{
    is_valid_secret, load_toml_or_default, resolve_config_path, resolve_secret, LoggingConfig,
};
use scenematch_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;

#[derive(Debug, Deserialize, Default, PartialEq)]
struct Sample {
    #[serde(default)]
    name: String,
    #[serde(default)]
    logging: Option<LoggingConfig>,
}

#[test]
#[serial]
fn cli_path_wins_over_environment() {
    let cli = tempfile::NamedTempFile::new().unwrap();
    let from_env = tempfile::NamedTempFile::new().unwrap();
    env::set_var("SCENEMATCH_TEST_CONFIG", from_env.path());

    let resolved = resolve_config_path(Some(cli.path()), "SCENEMATCH_TEST_CONFIG", "x.toml").unwrap();
    assert_eq!(resolved.as_deref(), Some(cli.path()));

    env::remove_var("SCENEMATCH_TEST_CONFIG");
}

#[test]
#[serial]
fn environment_path_used_without_cli() {
    let from_env = tempfile::NamedTempFile::new().unwrap();
    env::set_var("SCENEMATCH_TEST_CONFIG", from_env.path());

    let resolved = resolve_config_path(None, "SCENEMATCH_TEST_CONFIG", "x.toml").unwrap();
    assert_eq!(resolved.as_deref(), Some(from_env.path()));

    env::remove_var("SCENEMATCH_TEST_CONFIG");
}

#[test]
#[serial]
fn explicit_missing_file_is_config_error() {
    env::remove_var("SCENEMATCH_TEST_CONFIG");
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = resolve_config_path(Some(&missing), "SCENEMATCH_TEST_CONFIG", "x.toml").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn missing_file_yields_defaults() {
    let loaded: Sample = load_toml_or_default(None).unwrap();
    assert_eq!(loaded, Sample::default());
}

#[test]
fn partial_file_fills_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "name = \"demo\"\n[logging]\n").unwrap();

    let loaded: Sample = load_toml_or_default(Some(file.path())).unwrap();
    assert_eq!(loaded.name, "demo");
    assert_eq!(loaded.logging.unwrap().level, "info");
}

#[test]
fn malformed_file_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "name = [unterminated").unwrap();

    let err = load_toml_or_default::<Sample>(Some(file.path())).unwrap_err();
    assert!(matches!(err, Error::TomlParse(_)));
}

#[test]
fn debug_flag_overrides_log_level() {
    let logging = LoggingConfig {
        level: "warn".to_string(),
    };
    assert_eq!(logging.filter_directive(false), "warn");
    assert_eq!(logging.filter_directive(true), "debug");
}

#[test]
#[serial]
fn secret_prefers_environment() {
    env::set_var("SCENEMATCH_TEST_SECRET", "from-env");
    let value = resolve_secret("SCENEMATCH_TEST_SECRET", Some("from-toml"), "Test key");
    assert_eq!(value.as_deref(), Some("from-env"));
    env::remove_var("SCENEMATCH_TEST_SECRET");
}

#[test]
#[serial]
fn secret_falls_back_to_toml_and_ignores_blank() {
    env::set_var("SCENEMATCH_TEST_SECRET", "   ");
    let value = resolve_secret("SCENEMATCH_TEST_SECRET", Some("from-toml"), "Test key");
    assert_eq!(value.as_deref(), Some("from-toml"));

    env::remove_var("SCENEMATCH_TEST_SECRET");
    assert_eq!(resolve_secret("SCENEMATCH_TEST_SECRET", Some(""), "Test key"), None);
    assert!(!is_valid_secret("\t"));
}
