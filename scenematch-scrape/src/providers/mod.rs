//! Remote metadata providers
//!
//! Each provider is a [`ProviderAdapter`]: it shapes requests, unwraps the
//! provider's JSON and maps it onto the shared [`crate::types`] model. The
//! matching engine never sees provider-specific fields.

pub mod adulttime;
pub mod credentials;
pub mod http;
pub mod tpdb;
pub mod traxxx;

use crate::config::ScrapeConfig;
use crate::error::{ProviderError, ScrapeError};
use crate::services::query_builder::QueryPrePass;
use crate::types::{Candidate, SearchHits, SearchKind, TextMode};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

pub use adulttime::AdultTimeAdapter;
pub use http::ProviderHttp;
pub use tpdb::ThePornDbAdapter;
pub use traxxx::TraxxxAdapter;

/// Which provider a run talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Tpdb,
    Traxxx,
    #[serde(alias = "adult_time")]
    #[value(name = "adulttime")]
    AdultTime,
}

impl ProviderKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Tpdb => "ThePornDB",
            ProviderKind::Traxxx => "Traxxx",
            ProviderKind::AdultTime => "AdultTime",
        }
    }

    /// Fixed delay before every request unless configured otherwise
    pub fn default_request_delay_ms(self) -> u64 {
        match self {
            ProviderKind::Tpdb => 500,
            ProviderKind::Traxxx | ProviderKind::AdultTime => 1000,
        }
    }
}

/// Provider seam used by the generic matching engine
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Display name, also the key of the consecutive-error counter
    fn name(&self) -> &str;

    /// One request (or a short fixed sequence) against the provider.
    /// Unsupported kinds return an empty result of the right shape.
    async fn search(&self, kind: &SearchKind) -> Result<SearchHits, ProviderError>;

    /// Full record for an accepted candidate, when search results are partial
    async fn scene_details(&self, _candidate: &Candidate) -> Result<Option<Candidate>, ProviderError> {
        Ok(None)
    }

    /// Text query flavors to try in order
    fn text_modes(&self) -> &'static [TextMode] {
        &[TextMode::Plain]
    }

    /// Groups of studio names that substitute for one another
    fn studio_families(&self) -> &'static [&'static [&'static str]] {
        &[]
    }

    /// Filename analysis run before query scrubbing
    fn query_pre_pass(&self) -> Option<Arc<dyn QueryPrePass>> {
        None
    }

    /// Provider scene id embedded in a scene URL
    fn external_id_from_url(&self, _url: &str) -> Option<String> {
        None
    }
}

/// Provider ids arrive as strings or numbers depending on the endpoint
pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Build the adapter selected by configuration
pub async fn build_adapter(config: &ScrapeConfig) -> Result<Arc<dyn ProviderAdapter>, ScrapeError> {
    let delay_ms = config
        .request_delay_ms
        .unwrap_or_else(|| config.provider.default_request_delay_ms());
    let http = ProviderHttp::new(delay_ms, config.connect_timeout_secs, config.read_timeout_secs)
        .map_err(|e| ScrapeError::Config(e.to_string()))?;

    let adapter: Arc<dyn ProviderAdapter> = match config.provider {
        ProviderKind::Tpdb => {
            let key = config.resolve_tpdb_api_key().ok_or_else(|| {
                ScrapeError::Config(
                    "ThePornDB API key not configured. Set SCENEMATCH_TPDB_API_KEY or tpdb_api_key in the config file"
                        .to_string(),
                )
            })?;
            Arc::new(ThePornDbAdapter::new(http, &config.tpdb_url, key))
        }
        ProviderKind::Traxxx => Arc::new(TraxxxAdapter::new(http, &config.traxxx_url)),
        ProviderKind::AdultTime => {
            let cache = credentials::CredentialCache::new(config.credential_cache_path());
            let creds = credentials::acquire(&http, &config.adulttime_bootstrap_url, &cache)
                .await
                .map_err(|e| ScrapeError::Config(format!("AdultTime credentials: {}", e)))?;
            Arc::new(AdultTimeAdapter::new(http, creds))
        }
    };
    Ok(adapter)
}
