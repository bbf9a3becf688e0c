//! Configuration file discovery, TOML loading and secret resolution
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory, then the system-wide location on Linux
//! 4. Compiled defaults (no file at all)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application directory name used under the platform config/data dirs
pub const APP_DIR: &str = "scenematch";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or full `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Filter directive for the tracing subscriber; `debug` wins over the file
    pub fn filter_directive(&self, debug: bool) -> String {
        if debug {
            "debug".to_string()
        } else {
            self.level.clone()
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve which config file to read, if any.
///
/// An explicitly named file (CLI or environment) must exist; a missing
/// discovered file simply means "use defaults".
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return require_existing(PathBuf::from(path));
        }
    }

    // Priority 3: platform locations
    Ok(discover_config_file(file_name))
}

fn require_existing(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Look for `file_name` in the per-user config dir, then `/etc` on Linux
fn discover_config_file(file_name: &str) -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join(file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR).join(file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load a TOML document into `T`, falling back to `T::default()` when no
/// file was resolved.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let parsed = toml::from_str(&content)?;
            info!("Loaded configuration from {}", path.display());
            Ok(parsed)
        }
        None => {
            warn!("No configuration file found, using built-in defaults");
            Ok(T::default())
        }
    }
}

/// Per-user data directory for small state files (credential caches)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

/// Resolve a secret from ENV then TOML, warning when both are present.
///
/// Returns `None` when neither source holds a non-blank value.
pub fn resolve_secret(env_var_name: &str, toml_value: Option<&str>, label: &str) -> Option<String> {
    let env_value = std::env::var(env_var_name)
        .ok()
        .filter(|v| is_valid_secret(v));
    let toml_value = toml_value.filter(|v| is_valid_secret(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in multiple sources: environment, TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable {}", label, env_var_name);
        return Some(value);
    }

    toml_value.map(|value| {
        info!("{} loaded from TOML config", label);
        value.to_string()
    })
}

/// Non-empty, non-whitespace
pub fn is_valid_secret(value: &str) -> bool {
    !value.trim().is_empty()
}
