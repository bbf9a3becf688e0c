//! AdultTime search credentials
//!
//! The public site embeds its search application id and key in a
//! `window.env = {...};` assignment. Keys are cached on disk as
//! `<timestamp>|<app id>|<key>` and reused within the same hour of the
//! same day.

use super::ProviderHttp;
use crate::error::ProviderError;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use scenematch_common::time::{local_now, within_same_day_window};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

static WINDOW_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"window.env\s+=\s(.+);").expect("window.env regex should compile"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub api_key: String,
}

#[derive(Deserialize)]
struct WindowEnv {
    api: ApiSection,
}

#[derive(Deserialize)]
struct ApiSection {
    algolia: AlgoliaSection,
}

#[derive(Deserialize)]
struct AlgoliaSection {
    #[serde(rename = "applicationID")]
    application_id: String,
    #[serde(rename = "apiKey")]
    api_key: String,
}

/// Pull the credentials out of the bootstrap page
pub fn extract_credentials(html: &str) -> Result<Credentials, ProviderError> {
    let caps = WINDOW_ENV
        .captures(html)
        .ok_or_else(|| ProviderError::Credential("window.env not found in page".to_string()))?;
    let env: WindowEnv = serde_json::from_str(&caps[1])
        .map_err(|e| ProviderError::Credential(format!("window.env is not usable JSON: {}", e)))?;
    Ok(Credentials {
        app_id: env.api.algolia.application_id,
        api_key: env.api.algolia.api_key,
    })
}

pub fn format_cache_line(at: NaiveDateTime, creds: &Credentials) -> String {
    format!("{}|{}|{}", at.format(TIMESTAMP_FORMAT), creds.app_id, creds.api_key)
}

pub fn parse_cache_line(line: &str) -> Option<(NaiveDateTime, Credentials)> {
    let mut parts = line.trim().splitn(3, '|');
    let at = NaiveDateTime::parse_from_str(parts.next()?, TIMESTAMP_FORMAT).ok()?;
    let app_id = parts.next()?.to_string();
    let api_key = parts.next()?.to_string();
    if app_id.is_empty() || api_key.is_empty() {
        return None;
    }
    Some((at, Credentials { app_id, api_key }))
}

/// On-disk credential cache
#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: PathBuf,
}

impl CredentialCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached credentials when still fresh at `now`
    pub async fn load(&self, now: NaiveDateTime) -> Option<Credentials> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        let (at, creds) = parse_cache_line(&content)?;
        if within_same_day_window(at, now, chrono::Duration::hours(1)) {
            Some(creds)
        } else {
            debug!(cached_at = %at, "Cached search credentials expired");
            None
        }
    }

    pub async fn store(&self, at: NaiveDateTime, creds: &Credentials) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, format_cache_line(at, creds)).await
    }
}

/// Cached credentials, or fresh ones from the bootstrap page
pub async fn acquire(
    http: &ProviderHttp,
    bootstrap_url: &str,
    cache: &CredentialCache,
) -> Result<Credentials, ProviderError> {
    let now = local_now();
    if let Some(creds) = cache.load(now).await {
        debug!("Using cached search credentials");
        return Ok(creds);
    }

    let html = http.get_text(bootstrap_url, &[], HeaderMap::new()).await?;
    let creds = extract_credentials(&html)?;
    info!(app_id = %creds.app_id, "Fetched new search credentials");

    if let Err(e) = cache.store(now, &creds).await {
        warn!(path = %cache.path().display(), error = %e, "Failed to cache search credentials");
    }
    Ok(creds)
}
