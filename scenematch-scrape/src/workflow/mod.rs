//! Batch workflow
//!
//! Selects scenes from the catalog for a run mode and drives each one
//! through the [`pipeline::ScenePipeline`], sequentially.

pub mod pipeline;
pub mod statistics;

pub use pipeline::{ScenePipeline, SceneOutcome};
pub use statistics::RunStatistics;

use crate::catalog::{CatalogClient, SceneFilter};
use crate::config::{ScrapeConfig, TagNames};
use crate::error::ScrapeResult;
use crate::services::candidate_fetcher::CandidateFetcher;
use crate::services::image_normalizer::ImageNormalizer;
use crate::services::operator::Operator;
use crate::session::MatchSession;
use crate::types::CatalogId;
use tracing::{error, info, warn};

/// Which scenes a run selects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Scenes not yet scraped, unmatched or ambiguous
    #[default]
    Default,
    /// Also scenes already scraped
    Rescrape,
    /// Only scenes tagged unmatched
    RetryUnmatched,
    /// Only scenes tagged ambiguous, with manual disambiguation
    DisambiguateOnly,
    /// Only scenes tagged with an unconfirmed alias, with alias confirmation
    VerifyAliasesOnly,
}

impl RunMode {
    /// Toggles a mode implies
    pub fn adjust_config(self, config: &mut ScrapeConfig) {
        match self {
            RunMode::DisambiguateOnly => config.manual_disambiguate = true,
            RunMode::VerifyAliasesOnly => config.confirm_questionable_aliases = true,
            _ => {}
        }
    }

    fn required_tag(self, tags: &TagNames) -> Option<&str> {
        match self {
            RunMode::RetryUnmatched => tags.unmatched.as_deref(),
            RunMode::DisambiguateOnly => tags.ambiguous.as_deref(),
            RunMode::VerifyAliasesOnly => tags.unconfirmed_alias.as_deref(),
            RunMode::Default | RunMode::Rescrape => None,
        }
    }

    fn excluded_tags(self, tags: &TagNames) -> Vec<&str> {
        let names = match self {
            RunMode::Default => vec![&tags.scrape, &tags.unmatched, &tags.ambiguous],
            RunMode::Rescrape => vec![&tags.unmatched, &tags.ambiguous],
            _ => Vec::new(),
        };
        names.into_iter().flatten().map(String::as_str).collect()
    }
}

/// Per-run selection options from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    pub query: Option<String>,
    /// Extra required tag names
    pub tags: Vec<String>,
    /// Extra excluded tag names
    pub not_tags: Vec<String>,
    pub path_include: Option<String>,
    pub max_scenes: Option<usize>,
    /// Drop `tags` from a scene once it matches
    pub remove_search_tag: bool,
}

/// Scene filter for a run. `None` when a required tag does not exist, so
/// no scene can qualify.
pub async fn build_scene_filter(
    catalog: &dyn CatalogClient,
    config: &ScrapeConfig,
    tags: &TagNames,
    options: &RunOptions,
) -> ScrapeResult<Option<SceneFilter>> {
    let mut filter = SceneFilter {
        query: options.query.clone().filter(|q| !q.trim().is_empty()),
        path_includes: options.path_include.clone(),
        organized: config.only_unorganized.then_some(false),
        without_stash_id: config.skip_with_stash_id,
        max_scenes: options.max_scenes,
        sort: Some("path".to_string()),
        ..Default::default()
    };

    let required = config
        .required_tags
        .iter()
        .chain(&options.tags)
        .map(String::as_str)
        .chain(options.mode.required_tag(tags));
    for name in required {
        match catalog.find_tag(name).await? {
            Some(tag) => filter.required_tag_ids.push(tag.id),
            None => {
                warn!(tag = %name, "Required tag does not exist, no scenes to scrape");
                return Ok(None);
            }
        }
    }

    let excluded = config
        .excluded_tags
        .iter()
        .chain(&options.not_tags)
        .map(String::as_str)
        .chain(options.mode.excluded_tags(tags));
    for name in excluded {
        if let Some(tag) = catalog.find_tag(name).await? {
            if !filter.excluded_tag_ids.contains(&tag.id) {
                filter.excluded_tag_ids.push(tag.id);
            }
        }
    }

    Ok(Some(filter))
}

/// Everything a batch run needs
pub struct BatchRunner<'a> {
    pub config: &'a ScrapeConfig,
    pub catalog: &'a dyn CatalogClient,
    pub fetcher: &'a CandidateFetcher,
    pub images: Option<&'a ImageNormalizer>,
}

impl<'a> BatchRunner<'a> {
    /// Select and process scenes, counting outcomes into `stats`. A fatal
    /// error stops the run before the next scene; other per-scene errors
    /// are counted and logged.
    pub async fn run(
        &self,
        operator: &mut dyn Operator,
        options: &RunOptions,
        stats: &mut RunStatistics,
    ) -> ScrapeResult<()> {
        let tags = self.config.tag_names(self.fetcher.provider_name());

        let Some(filter) = build_scene_filter(self.catalog, self.config, &tags, options).await? else {
            return Ok(());
        };

        self.catalog.wait_for_idle().await?;
        let scenes = self.catalog.find_scenes(&filter).await?;
        info!("Scenes to scrape: {}", scenes.len());

        let remove_tag_ids = if options.remove_search_tag {
            self.tag_ids(&options.tags).await?
        } else {
            Vec::new()
        };
        let pipeline = ScenePipeline::new(self.config, &tags, self.catalog, self.fetcher, self.images)
            .with_removed_tags(remove_tag_ids);
        let mut session = MatchSession::new(self.config.max_consecutive_errors);

        let total = scenes.len();
        for (i, scene) in scenes.iter().enumerate() {
            info!("Scraping scene {}/{}: {}", i + 1, total, scene.label());
            match pipeline.process(&mut session, operator, scene).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(
                        scene_id = %scene.id.as_deref().unwrap_or("<new>"),
                        path = %scene.path,
                        error = %e,
                        "Scene failed"
                    );
                    stats.record(SceneOutcome::UpdateFailure);
                }
            }
        }

        Ok(())
    }

    async fn tag_ids(&self, names: &[String]) -> ScrapeResult<Vec<CatalogId>> {
        let mut ids = Vec::new();
        for name in names {
            if let Some(tag) = self.catalog.find_tag(name).await? {
                ids.push(tag.id);
            }
        }
        Ok(ids)
    }
}
