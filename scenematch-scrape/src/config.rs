//! Scrape run configuration
//!
//! Loaded from TOML (see `scenematch_common::config` for file discovery).
//! Every key is optional; omitted keys take the defaults below. Secrets
//! resolve ENV → TOML.

use crate::providers::ProviderKind;
use scenematch_common::config::{default_data_dir, resolve_secret, LoggingConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SCENEMATCH_CONFIG";
/// Default config file name under the platform config dir
pub const CONFIG_FILE_NAME: &str = "scenematch.toml";

const TPDB_KEY_ENV: &str = "SCENEMATCH_TPDB_API_KEY";
const CATALOG_KEY_ENV: &str = "SCENEMATCH_CATALOG_API_KEY";
const CATALOG_URL_ENV: &str = "SCENEMATCH_CATALOG_URL";

/// Catalog server connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Poll interval while waiting for the catalog job queue to drain
    pub idle_poll_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9999".to_string(),
            api_key: None,
            idle_poll_ms: 1000,
        }
    }
}

/// Similarity thresholds used by the disambiguation policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    /// Studio and date both agree: text only has to be loosely similar
    pub studio_date: f64,
    /// Studio alone agrees: text has to carry the decision
    pub studio: f64,
    /// Studio differs but is close, date agrees: text must be near identical
    pub close_studio_date: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            studio_date: 0.65,
            studio: 0.9,
            close_studio_date: 0.99,
        }
    }
}

/// Resolved bookkeeping tag names; `None` disables a tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagNames {
    pub scrape: Option<String>,
    pub unmatched: Option<String>,
    pub ambiguous: Option<String>,
    pub unconfirmed_alias: Option<String>,
    pub ambiguous_performer_prefix: Option<String>,
}

impl TagNames {
    /// Tag recording an unresolved performer, e.g. "Ambiguous Performer: Jane"
    pub fn ambiguous_performer(&self, name: &str) -> Option<String> {
        self.ambiguous_performer_prefix
            .as_ref()
            .map(|prefix| format!("{}: {}", prefix, name))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub provider: ProviderKind,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,

    // Query building
    pub parse_with_filename: bool,
    pub clean_filename: bool,
    pub dirs_in_query: usize,
    /// Replaces the built-in filename deny-list when set
    pub scrub_patterns: Option<Vec<String>>,
    pub use_studio_family_filter: bool,
    pub fail_no_date: bool,

    // Thresholds
    pub studio_date_threshold: f64,
    pub studio_threshold: f64,
    pub close_studio_date_threshold: f64,

    // Disambiguation
    pub manual_disambiguate: bool,
    pub auto_disambiguate: bool,

    // Merge toggles
    pub set_details: bool,
    pub set_date: bool,
    pub set_url: bool,
    pub set_cover_image: bool,
    pub set_studio: bool,
    pub set_tags: bool,
    pub set_performers: bool,
    pub set_title: bool,
    pub add_studio: bool,
    pub add_tags: bool,
    pub add_performers: bool,
    pub include_performers_in_title: bool,
    pub male_performers_in_title: bool,
    pub compact_studio_names: bool,
    pub studio_network_suffix: String,

    // Performer policy
    pub only_add_female_performers: bool,
    pub trust_remote_aliases: bool,
    pub confirm_questionable_aliases: bool,
    pub tag_ambiguous_performers: bool,
    pub add_ambiguous_performers: bool,
    pub suffix_singlename_performers: bool,
    pub scrape_performers_freeones: bool,
    pub get_images_from_portrait_site: bool,
    /// `{name}` is replaced by the URL-escaped performer name
    pub portrait_site_url: String,

    // Bookkeeping tags; "{provider}" expands to the provider display name
    pub scrape_tag: String,
    pub unmatched_tag: String,
    pub ambiguous_tag: String,
    pub unconfirmed_alias_tag: String,
    pub ambiguous_performer_tag_prefix: String,

    // Politeness
    pub request_delay_ms: Option<u64>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_consecutive_errors: u32,

    // Provider endpoints and secrets
    pub tpdb_url: String,
    pub tpdb_api_key: Option<String>,
    pub traxxx_url: String,
    pub adulttime_bootstrap_url: String,
    pub credential_cache_path: Option<PathBuf>,

    // Batch filters
    pub required_tags: Vec<String>,
    pub excluded_tags: Vec<String>,
    pub only_unorganized: bool,
    pub skip_with_stash_id: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),

            parse_with_filename: true,
            clean_filename: true,
            dirs_in_query: 0,
            scrub_patterns: None,
            use_studio_family_filter: true,
            fail_no_date: false,

            studio_date_threshold: MatchThresholds::default().studio_date,
            studio_threshold: MatchThresholds::default().studio,
            close_studio_date_threshold: MatchThresholds::default().close_studio_date,

            manual_disambiguate: false,
            auto_disambiguate: false,

            set_details: true,
            set_date: true,
            set_url: true,
            set_cover_image: true,
            set_studio: true,
            set_tags: true,
            set_performers: true,
            set_title: true,
            add_studio: false,
            add_tags: false,
            add_performers: true,
            include_performers_in_title: true,
            male_performers_in_title: false,
            compact_studio_names: false,
            studio_network_suffix: " (Network)".to_string(),

            only_add_female_performers: true,
            trust_remote_aliases: false,
            confirm_questionable_aliases: true,
            tag_ambiguous_performers: true,
            add_ambiguous_performers: false,
            suffix_singlename_performers: false,
            scrape_performers_freeones: true,
            get_images_from_portrait_site: true,
            portrait_site_url: "https://www.babepedia.com/pics/{name}.jpg".to_string(),

            scrape_tag: "Scraped From {provider}".to_string(),
            unmatched_tag: "Missing From {provider}".to_string(),
            ambiguous_tag: "{provider} Ambiguous".to_string(),
            unconfirmed_alias_tag: "{provider} Unconfirmed Alias".to_string(),
            ambiguous_performer_tag_prefix: "Ambiguous Performer".to_string(),

            request_delay_ms: None,
            connect_timeout_secs: 3,
            read_timeout_secs: 5,
            max_consecutive_errors: 3,

            tpdb_url: "https://api.theporndb.net".to_string(),
            tpdb_api_key: None,
            traxxx_url: "https://traxxx.me".to_string(),
            adulttime_bootstrap_url: "https://www.girlsway.com/en".to_string(),
            credential_cache_path: None,

            required_tags: Vec::new(),
            excluded_tags: Vec::new(),
            only_unorganized: false,
            skip_with_stash_id: false,
        }
    }
}

impl ScrapeConfig {
    pub fn thresholds(&self) -> MatchThresholds {
        MatchThresholds {
            studio_date: self.studio_date_threshold,
            studio: self.studio_threshold,
            close_studio_date: self.close_studio_date_threshold,
        }
    }

    /// Expand tag templates for the given provider display name
    pub fn tag_names(&self, provider_name: &str) -> TagNames {
        let expand = |template: &str| {
            let name = template.replace("{provider}", provider_name);
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        };
        TagNames {
            scrape: expand(&self.scrape_tag),
            unmatched: expand(&self.unmatched_tag),
            ambiguous: expand(&self.ambiguous_tag),
            unconfirmed_alias: expand(&self.unconfirmed_alias_tag),
            ambiguous_performer_prefix: expand(&self.ambiguous_performer_tag_prefix),
        }
    }

    /// ThePornDB bearer token (ENV → TOML)
    pub fn resolve_tpdb_api_key(&self) -> Option<String> {
        resolve_secret(TPDB_KEY_ENV, self.tpdb_api_key.as_deref(), "ThePornDB API key")
    }

    /// Catalog API key (ENV → TOML)
    pub fn resolve_catalog_api_key(&self) -> Option<String> {
        resolve_secret(CATALOG_KEY_ENV, self.catalog.api_key.as_deref(), "Catalog API key")
    }

    /// Catalog base URL (ENV → TOML → default)
    pub fn resolve_catalog_url(&self) -> String {
        resolve_secret(CATALOG_URL_ENV, Some(self.catalog.url.as_str()), "Catalog URL")
            .unwrap_or_else(|| CatalogConfig::default().url)
    }

    pub fn credential_cache_path(&self) -> PathBuf {
        self.credential_cache_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("adulttime_key.txt"))
    }

    /// Portrait URL for a performer name
    pub fn portrait_url(&self, name: &str) -> String {
        self.portrait_site_url
            .replace("{name}", &name.trim().replace(' ', "%20"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn empty_document_gives_defaults() {
        let config: ScrapeConfig = toml::from_str("").unwrap();
        assert!(config.parse_with_filename);
        assert_eq!(config.thresholds(), MatchThresholds::default());
        assert_eq!(config.max_consecutive_errors, 3);
        assert_eq!(config.provider, ProviderKind::Tpdb);
    }

    #[test]
    fn partial_document_overrides_selected_keys() {
        let config: ScrapeConfig = toml::from_str(
            r#"
            provider = "traxxx"
            studio_threshold = 0.8
            add_tags = true
            [catalog]
            url = "http://stash:9999"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Traxxx);
        assert_eq!(config.thresholds().studio, 0.8);
        assert_eq!(config.thresholds().studio_date, 0.65);
        assert!(config.add_tags);
        assert_eq!(config.catalog.url, "http://stash:9999");
        assert_eq!(config.catalog.idle_poll_ms, 1000);
    }

    #[test]
    fn tag_templates_expand_and_blank_disables() {
        let mut config = ScrapeConfig::default();
        config.ambiguous_tag = String::new();
        let tags = config.tag_names("ThePornDB");
        assert_eq!(tags.scrape.as_deref(), Some("Scraped From ThePornDB"));
        assert_eq!(tags.unmatched.as_deref(), Some("Missing From ThePornDB"));
        assert_eq!(tags.unconfirmed_alias.as_deref(), Some("ThePornDB Unconfirmed Alias"));
        assert_eq!(tags.ambiguous, None);
        assert_eq!(
            tags.ambiguous_performer("Jane").as_deref(),
            Some("Ambiguous Performer: Jane")
        );
    }

    #[test]
    fn portrait_url_escapes_spaces() {
        let config = ScrapeConfig::default();
        assert_eq!(
            config.portrait_url("Jane Doe"),
            "https://www.babepedia.com/pics/Jane%20Doe.jpg"
        );
    }

    #[test]
    #[serial]
    fn tpdb_key_from_environment() {
        std::env::set_var(TPDB_KEY_ENV, "env-key");
        let mut config = ScrapeConfig::default();
        config.tpdb_api_key = Some("toml-key".to_string());
        assert_eq!(config.resolve_tpdb_api_key().as_deref(), Some("env-key"));
        std::env::remove_var(TPDB_KEY_ENV);
        assert_eq!(config.resolve_tpdb_api_key().as_deref(), Some("toml-key"));
    }

    #[test]
    #[serial]
    fn catalog_url_default_when_unset() {
        std::env::remove_var(CATALOG_URL_ENV);
        let config = ScrapeConfig::default();
        assert_eq!(config.resolve_catalog_url(), "http://localhost:9999");
    }
}
