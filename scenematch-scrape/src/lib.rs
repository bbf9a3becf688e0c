//! scenematch-scrape library interface
//!
//! Matches catalog scenes against a remote metadata provider and merges
//! the accepted record back. Exposed as a library for integration tests.

pub mod catalog;
pub mod config;
pub mod error;
pub mod providers;
pub mod services;
pub mod session;
pub mod types;
pub mod workflow;

pub use crate::config::ScrapeConfig;
pub use crate::error::{ScrapeError, ScrapeResult};
pub use crate::session::MatchSession;
