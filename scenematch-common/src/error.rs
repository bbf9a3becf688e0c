//! Common error types for scenematch

use thiserror::Error;

/// Common result type for scenematch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across scenematch crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML document could not be parsed into the requested shape
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
