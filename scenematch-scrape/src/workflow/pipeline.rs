//! Per-scene matching pipeline
//!
//! query → candidates → filter → score → decide → resolve performers →
//! merge → commit. Every terminal outcome is reported as a
//! [`SceneOutcome`]; only fatal errors (provider outage) and catalog
//! failures escape as `Err`.

use crate::catalog::CatalogClient;
use crate::config::{ScrapeConfig, TagNames};
use crate::error::ScrapeResult;
use crate::services::candidate_fetcher::CandidateFetcher;
use crate::services::candidate_scorer::{filter_by_studio_family, score_candidates, SceneContext};
use crate::services::disambiguator::{decide, describe_candidate, Decision, DisambiguationPolicy, MatchReason, TieBreak};
use crate::services::image_normalizer::ImageNormalizer;
use crate::services::merge_engine::{MergeEngine, MergeInput};
use crate::services::operator::Operator;
use crate::services::performer_resolver::PerformerResolver;
use crate::services::query_builder::{strip_date_token, Query, QueryBuilder, QueryStrategy};
use crate::session::MatchSession;
use crate::types::{Candidate, CatalogId, LocalScene, SceneUpdate, SearchKind};
use tracing::{debug, error, info, warn};

/// Terminal state of one scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneOutcome {
    Matched,
    Ambiguous,
    Unmatched,
    /// Scene path could not be turned into a query
    ParseFailure,
    /// Every provider request for the scene failed; nothing was written
    ProviderFailure,
    /// Match found but the catalog rejected the write
    UpdateFailure,
}

/// Candidates found for a scene, with the query that found them
enum Lookup {
    /// Exact provider id taken from the scene URL
    Exact(Candidate),
    /// `query` is the first query built for the scene, before any retry
    Searched { query: Query, candidates: Vec<Candidate> },
    TransportFailure,
}

/// Tie-break implied by the disambiguation toggles; manual wins over automatic
pub fn tie_break_for(config: &ScrapeConfig) -> TieBreak {
    if config.manual_disambiguate {
        TieBreak::Manual
    } else if config.auto_disambiguate {
        TieBreak::Automatic
    } else {
        TieBreak::None
    }
}

pub struct ScenePipeline<'a> {
    config: &'a ScrapeConfig,
    catalog: &'a dyn CatalogClient,
    fetcher: &'a CandidateFetcher,
    queries: QueryBuilder,
    policy: DisambiguationPolicy,
    performers: PerformerResolver<'a>,
    merge: MergeEngine<'a>,
    remove_tag_ids: Vec<CatalogId>,
    tags: &'a TagNames,
}

impl<'a> ScenePipeline<'a> {
    pub fn new(
        config: &'a ScrapeConfig,
        tags: &'a TagNames,
        catalog: &'a dyn CatalogClient,
        fetcher: &'a CandidateFetcher,
        images: Option<&'a ImageNormalizer>,
    ) -> Self {
        Self {
            config,
            catalog,
            fetcher,
            queries: QueryBuilder::from_config(config, fetcher.adapter().query_pre_pass()),
            policy: DisambiguationPolicy {
                thresholds: config.thresholds(),
                tie_break: tie_break_for(config),
            },
            performers: PerformerResolver::new(config, tags, catalog, fetcher, images),
            merge: MergeEngine::new(config, tags, catalog, fetcher, images),
            remove_tag_ids: Vec::new(),
            tags,
        }
    }

    /// Tags removed from a scene once it matches
    pub fn with_removed_tags(mut self, ids: Vec<CatalogId>) -> Self {
        self.remove_tag_ids = ids;
        self
    }

    pub async fn process(
        &self,
        session: &mut MatchSession,
        operator: &mut dyn Operator,
        scene: &LocalScene,
    ) -> ScrapeResult<SceneOutcome> {
        let lookup = match self.lookup(session, scene).await? {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(scene = %scene.label(), error = %e, "Could not build a query for scene");
                return self.mark(scene, self.tags.unmatched.as_deref(), SceneOutcome::ParseFailure).await;
            }
        };

        let (query, candidates) = match lookup {
            Lookup::Exact(candidate) => {
                info!(scene = %scene.label(), title = %candidate.title, "Matched by provider id from scene URL");
                return self.accept(session, operator, scene, candidate, false).await;
            }
            Lookup::TransportFailure => {
                warn!(scene = %scene.label(), "Provider unavailable for this scene, leaving it untouched");
                return Ok(SceneOutcome::ProviderFailure);
            }
            Lookup::Searched { query, candidates } => (query, candidates),
        };

        let families = self.fetcher.adapter().studio_families();
        let candidates = if self.config.use_studio_family_filter && !families.is_empty() {
            filter_by_studio_family(scene.studio_name(), candidates, families)
        } else {
            candidates
        };

        let context = SceneContext::new(scene, &query);
        let scored = score_candidates(&context, candidates, families);
        for c in &scored {
            debug!(scene = %scene.label(), candidate = %describe_candidate(c), "Scored candidate");
        }

        let decision = match decide(&scored, &self.policy) {
            Decision::NeedsOperator => {
                let options: Vec<String> = scored.iter().map(describe_candidate).collect();
                match operator.choose_candidate(scene.label(), &options) {
                    Some(index) if index < scored.len() => Decision::Matched {
                        index,
                        reason: MatchReason::OperatorChoice,
                        adopt_scene_date: false,
                    },
                    _ => Decision::Ambiguous,
                }
            }
            other => other,
        };

        match decision {
            Decision::Matched {
                index,
                reason,
                adopt_scene_date,
            } => {
                let Some(chosen) = scored.into_iter().nth(index) else {
                    return self.mark(scene, self.tags.ambiguous.as_deref(), SceneOutcome::Ambiguous).await;
                };
                info!(
                    scene = %scene.label(),
                    ?reason,
                    score = chosen.score,
                    title = %chosen.candidate.title,
                    "Matched scene"
                );
                self.accept(session, operator, scene, chosen.candidate, adopt_scene_date)
                    .await
            }
            Decision::Ambiguous | Decision::NeedsOperator => {
                info!(scene = %scene.label(), candidates = scored.len(), "Scene is ambiguous");
                self.mark(scene, self.tags.ambiguous.as_deref(), SceneOutcome::Ambiguous).await
            }
            Decision::Unmatched => {
                info!(scene = %scene.label(), query = %query.as_str(), "No match found");
                self.mark(scene, self.tags.unmatched.as_deref(), SceneOutcome::Unmatched).await
            }
        }
    }

    /// Run the search strategies in order. The inner `Err` is a path that
    /// could not be parsed.
    async fn lookup(
        &self,
        session: &mut MatchSession,
        scene: &LocalScene,
    ) -> ScrapeResult<Result<Lookup, crate::error::PathParseError>> {
        let adapter = self.fetcher.adapter();
        if let Some(id) = scene.url.as_deref().and_then(|u| adapter.external_id_from_url(u)) {
            let kind = SearchKind::ExternalId(id);
            if let Some(found) = self.fetcher.search_scenes(session, &kind).await? {
                if let Some(candidate) = found.into_iter().next() {
                    return Ok(Ok(Lookup::Exact(candidate)));
                }
            }
        }

        let query = match self.queries.build(scene) {
            Ok(query) => query,
            Err(e) => return Ok(Err(e)),
        };
        debug!(scene = %scene.label(), query = %query.as_str(), "Built query");

        // Retries and narrowing search with `searched`; scoring keeps `query`
        let mut searched = query.clone();
        let mut found = self.fetcher.search_text(session, searched.as_str()).await?;

        if self.config.fail_no_date {
            let mut retry = scene.clone();
            while found.as_ref().map_or(true, Vec::is_empty) {
                let Some(stripped) = strip_date_token(&retry.path) else { break };
                retry.path = stripped;
                let Ok(narrower) = self.queries.build(&retry) else { break };
                debug!(scene = %scene.label(), query = %narrower.as_str(), "Retrying without date");
                found = self.fetcher.search_text(session, narrower.as_str()).await?;
                searched = narrower;
            }
        }

        let Some(mut candidates) = found else {
            return Ok(Ok(Lookup::TransportFailure));
        };

        if matches!(self.queries.strategy(), QueryStrategy::Metadata { .. }) && candidates.len() > 1 {
            let date = scene.date.map(|d| d.format("%Y-%m-%d").to_string());
            for suffix in [scene.studio_name().map(str::to_string), date].into_iter().flatten() {
                if candidates.len() <= 1 {
                    break;
                }
                let narrower = searched.with_suffix(&suffix);
                if let Some(fewer) = self.fetcher.search_text(session, narrower.as_str()).await? {
                    if !fewer.is_empty() {
                        debug!(scene = %scene.label(), query = %narrower.as_str(), hits = fewer.len(), "Narrowed search");
                        candidates = fewer;
                        searched = narrower;
                    }
                }
            }
        }

        Ok(Ok(Lookup::Searched { query, candidates }))
    }

    async fn accept(
        &self,
        session: &mut MatchSession,
        operator: &mut dyn Operator,
        scene: &LocalScene,
        candidate: Candidate,
        adopt_scene_date: bool,
    ) -> ScrapeResult<SceneOutcome> {
        let candidate = match self.fetcher.scene_details(session, &candidate).await? {
            Some(full) => full,
            None => candidate,
        };

        let resolution = if self.config.set_performers || self.config.include_performers_in_title {
            let source_text = format!("{} {}", scene.path, scene.title().unwrap_or_default());
            Some(
                self.performers
                    .resolve(session, operator, &candidate, &source_text)
                    .await?,
            )
        } else {
            None
        };

        let mut update = self.catalog.build_update(scene);
        let input = MergeInput {
            performers: resolution.as_ref(),
            adopt_scene_date,
            remove_tag_ids: self.remove_tag_ids.clone(),
        };
        self.merge.apply(session, &mut update, &candidate, &input).await?;
        self.commit(scene, &update, SceneOutcome::Matched).await
    }

    /// Replace stale bookkeeping tags with `tag`; nothing else changes
    async fn mark(&self, scene: &LocalScene, tag: Option<&str>, outcome: SceneOutcome) -> ScrapeResult<SceneOutcome> {
        let original = self.catalog.build_update(scene);
        if original.id.is_none() {
            return Ok(outcome);
        }
        let mut update = original.clone();
        self.merge.strip_bookkeeping_tags(&mut update).await?;
        self.merge.add_bookkeeping_tag(&mut update, tag).await?;
        if update == original {
            return Ok(outcome);
        }
        self.commit(scene, &update, outcome).await
    }

    async fn commit(&self, scene: &LocalScene, update: &SceneUpdate, outcome: SceneOutcome) -> ScrapeResult<SceneOutcome> {
        match self.catalog.commit_scene(update).await {
            Ok(id) => {
                debug!(scene_id = %id, ?outcome, "Scene updated");
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    scene_id = %scene.id.as_deref().unwrap_or("<new>"),
                    path = %scene.path,
                    error = %e,
                    "Failed to update scene"
                );
                Ok(SceneOutcome::UpdateFailure)
            }
        }
    }
}
