//! Projects an accepted candidate onto a scene update

use crate::catalog::{CatalogClient, NewStudio};
use crate::config::{ScrapeConfig, TagNames};
use crate::error::ScrapeResult;
use crate::services::candidate_fetcher::CandidateFetcher;
use crate::services::image_normalizer::{is_placeholder_image, ImageNormalizer};
use crate::services::normalizer::{clean_tag_name, compact_name, strip_leading};
use crate::services::performer_resolver::PerformerResolution;
use crate::session::MatchSession;
use crate::types::{Candidate, CatalogId, RemoteStudio, SceneUpdate};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Parent chains longer than this are cut off
const MAX_STUDIO_DEPTH: usize = 8;

/// Oxford-style performer prefix: "A ", "A and B ", "A, B, and C "
pub fn title_prefix(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => format!("{} ", one),
        [first, second] => format!("{} and {} ", first, second),
        [init @ .., last] => format!("{}, and {} ", init.join(", "), last),
    }
}

/// Remote title with the performer prefix, each prefixed name removed from
/// the front of the remote title first
pub fn assemble_title(names: &[String], remote_title: &str) -> String {
    let mut title = remote_title.trim().to_string();
    for name in names {
        title = strip_leading(&title, name).trim().to_string();
    }
    format!("{}{}", title_prefix(names), title).trim().to_string()
}

/// What to merge besides the candidate itself
#[derive(Debug, Clone, Default)]
pub struct MergeInput<'p> {
    pub performers: Option<&'p PerformerResolution>,
    /// Keep the scene's own date (matched on studio alone)
    pub adopt_scene_date: bool,
    /// Tag ids removed on success (`--remove-search-tag`)
    pub remove_tag_ids: Vec<CatalogId>,
}

pub struct MergeEngine<'a> {
    config: &'a ScrapeConfig,
    tags: &'a TagNames,
    catalog: &'a dyn CatalogClient,
    fetcher: &'a CandidateFetcher,
    images: Option<&'a ImageNormalizer>,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        config: &'a ScrapeConfig,
        tags: &'a TagNames,
        catalog: &'a dyn CatalogClient,
        fetcher: &'a CandidateFetcher,
        images: Option<&'a ImageNormalizer>,
    ) -> Self {
        Self {
            config,
            tags,
            catalog,
            fetcher,
            images,
        }
    }

    /// Drop ambiguous / unmatched / unconfirmed-alias markers. Missing tags
    /// are not created.
    pub async fn strip_bookkeeping_tags(&self, update: &mut SceneUpdate) -> ScrapeResult<()> {
        let names = [&self.tags.ambiguous, &self.tags.unmatched, &self.tags.unconfirmed_alias];
        for name in names.into_iter().flatten() {
            if let Some(tag) = self.catalog.find_tag(name).await? {
                update.tag_ids.remove(&tag.id);
            }
        }
        Ok(())
    }

    /// Add a bookkeeping tag, creating it when needed
    pub async fn add_bookkeeping_tag(&self, update: &mut SceneUpdate, name: Option<&str>) -> ScrapeResult<()> {
        if let Some(name) = name {
            let tag = self.catalog.find_or_create_tag(name).await?;
            update.tag_ids.insert(tag.id);
        }
        Ok(())
    }

    pub async fn apply(
        &self,
        session: &mut MatchSession,
        update: &mut SceneUpdate,
        candidate: &Candidate,
        input: &MergeInput<'_>,
    ) -> ScrapeResult<()> {
        self.strip_bookkeeping_tags(update).await?;
        let config = self.config;

        if config.set_details {
            if let Some(details) = candidate.details.as_ref().filter(|d| !d.trim().is_empty()) {
                update.details = Some(details.clone());
            }
        }
        if config.set_date && !(input.adopt_scene_date && update.date.is_some()) {
            if let Some(date) = candidate.date {
                update.date = Some(date);
            }
        }
        if config.set_url {
            if let Some(url) = candidate.url.as_ref().filter(|u| !u.trim().is_empty()) {
                update.url = Some(url.clone());
            }
        }
        if config.set_cover_image {
            if let Some(cover) = self.cover_image(candidate).await {
                update.cover_image = Some(cover);
            }
        }

        if config.set_studio {
            if let Some(studio) = &candidate.studio {
                if let Some(id) = self.resolve_studio(session, studio).await? {
                    update.studio_id = Some(id);
                }
            }
        }

        self.add_bookkeeping_tag(update, self.tags.scrape.as_deref()).await?;
        if config.set_tags {
            for raw in &candidate.tags {
                let name = clean_tag_name(raw);
                if name.is_empty() {
                    continue;
                }
                let tag = if config.add_tags {
                    Some(self.catalog.find_or_create_tag(&name).await?)
                } else {
                    self.catalog.find_tag(&name).await?
                };
                match tag {
                    Some(tag) => {
                        update.tag_ids.insert(tag.id);
                    }
                    None => debug!(tag = %name, "Tag not in catalog, skipping"),
                }
            }
        }

        let mut title_names: &[String] = &[];
        if let Some(performers) = input.performers {
            for name in &performers.tag_names {
                self.add_bookkeeping_tag(update, Some(name)).await?;
            }
            if config.set_performers {
                update.performer_ids.extend(performers.performer_ids.iter().cloned());
            }
            if config.include_performers_in_title {
                title_names = &performers.title_names;
            }
        }

        if config.set_title && !(candidate.title.trim().is_empty() && title_names.is_empty()) {
            update.title = Some(assemble_title(title_names, &candidate.title));
        }

        for id in &input.remove_tag_ids {
            update.tag_ids.remove(id);
        }
        Ok(())
    }

    async fn cover_image(&self, candidate: &Candidate) -> Option<String> {
        let url = candidate.cover_image.as_deref().filter(|u| !is_placeholder_image(u))?;
        let images = self.images?;
        match images.fetch_data_uri(url).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                warn!(url = %url, error = %e, "Cover image unavailable");
                None
            }
        }
    }

    fn studio_name(&self, studio: &RemoteStudio, is_parent: bool) -> String {
        let mut name = if self.config.compact_studio_names {
            compact_name(&studio.name)
        } else {
            studio.name.clone()
        };
        if is_parent && studio.is_network {
            name.push_str(&self.config.studio_network_suffix);
        }
        name
    }

    /// Catalog id for the candidate's studio, creating it and its parents
    /// top-down when configured
    pub async fn resolve_studio(&self, session: &mut MatchSession, studio: &RemoteStudio) -> ScrapeResult<Option<CatalogId>> {
        let leaf_name = self.studio_name(studio, false);
        if let Some(existing) = self.catalog.find_studio(&leaf_name).await? {
            return Ok(Some(existing.id));
        }
        if !self.config.add_studio {
            debug!(studio = %leaf_name, "Studio not in catalog and adding is disabled");
            return Ok(None);
        }

        let chain = self.studio_chain(session, studio).await?;
        let mut parent_id: Option<CatalogId> = None;
        for (depth, link) in chain.iter().enumerate().rev() {
            let name = self.studio_name(link, depth > 0);
            parent_id = match self.catalog.find_studio(&name).await? {
                Some(existing) => Some(existing.id),
                None => {
                    info!(studio = %name, "Did not find studio in catalog, adding it");
                    let new_studio = NewStudio {
                        name,
                        url: link.url.clone(),
                        details: link.details.clone(),
                        image: self.studio_logo(link).await,
                        parent_id: parent_id.clone(),
                    };
                    Some(self.catalog.create_studio(&new_studio).await?.id)
                }
            };
        }
        Ok(parent_id)
    }

    /// `[studio, parent, grandparent, ...]`
    async fn studio_chain(&self, session: &mut MatchSession, studio: &RemoteStudio) -> ScrapeResult<Vec<RemoteStudio>> {
        let mut chain = vec![studio.clone()];
        let mut seen: HashSet<String> = HashSet::from([studio.name.to_lowercase()]);

        while chain.len() < MAX_STUDIO_DEPTH {
            let Some(current) = chain.last() else { break };
            let next = match (&current.parent, &current.parent_ref) {
                (Some(parent), _) => Some(parent.as_ref().clone()),
                (None, Some(parent_ref)) => {
                    let parent_ref = parent_ref.clone();
                    self.fetcher.studio_by_ref(session, &parent_ref).await?
                }
                (None, None) => None,
            };
            match next {
                Some(parent) if seen.insert(parent.name.to_lowercase()) => chain.push(parent),
                Some(parent) => {
                    warn!(studio = %parent.name, "Studio parent chain loops, stopping");
                    break;
                }
                None => break,
            }
        }
        Ok(chain)
    }

    async fn studio_logo(&self, studio: &RemoteStudio) -> Option<String> {
        let logo = studio.logo.as_deref().filter(|l| !is_placeholder_image(l))?;
        match self.images?.fetch_data_uri(logo).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                debug!(url = %logo, error = %e, "Studio logo unavailable");
                None
            }
        }
    }
}
