//! # scenematch common library
//!
//! Shared code for the scenematch tools:
//! - Error type and result alias
//! - Configuration file discovery and TOML loading
//! - Logging configuration
//! - Time helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
