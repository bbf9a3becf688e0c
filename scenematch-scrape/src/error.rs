//! Error types for the scrape engine
//!
//! Layered the same way the engine is: provider transport failures,
//! catalog failures, path parsing and image handling each get their own
//! enum, and [`ScrapeError`] is what escapes a scene or a run.

use thiserror::Error;

/// Remote provider failures.
///
/// Every variant counts as a transport failure toward the provider's
/// consecutive-error limit.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error {0}: {1}")]
    Http(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Credential error: {0}")]
    Credential(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            ProviderError::Http(status.as_u16(), e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

/// Catalog (local media server) failures
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog network error: {0}")]
    Network(String),

    #[error("Catalog HTTP error {0}: {1}")]
    Http(u16, String),

    #[error("Catalog rejected request: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("Catalog parse error: {0}")]
    Parse(String),

    #[error("Catalog record not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => CatalogError::Http(status.as_u16(), e.to_string()),
            None if e.is_decode() => CatalogError::Parse(e.to_string()),
            None => CatalogError::Network(e.to_string()),
        }
    }
}

/// Scene path could not be split into directories, stem and extension
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot parse scene path {path:?}: {reason}")]
pub struct PathParseError {
    pub path: String,
    pub reason: &'static str,
}

/// Image fetch / transcode failures
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Errors that escape a scene or a whole run
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Too many consecutive transport failures; the run must stop
    #[error("{provider} seems to be down ({failures} consecutive failures)")]
    ProviderOutage { provider: String, failures: u32 },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// True when the run must not continue to the next scene
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrapeError::ProviderOutage { .. } | ScrapeError::Config(_))
    }
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
