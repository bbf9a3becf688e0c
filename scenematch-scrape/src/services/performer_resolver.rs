//! Performer identity resolution
//!
//! Maps the performer stubs of an accepted candidate onto catalog
//! performers. A remote name that is not in the catalog but is linked to a
//! canonical (parent) profile is adopted under the parent's name when the
//! link is trusted; otherwise the operator is asked or the scene is tagged
//! for review. Unlinked unknown names are tagged per performer, or created
//! when configured.

use crate::catalog::{CatalogClient, NewPerformer};
use crate::config::{ScrapeConfig, TagNames};
use crate::error::ScrapeResult;
use crate::services::candidate_fetcher::CandidateFetcher;
use crate::services::image_normalizer::{is_placeholder_image, ImageNormalizer};
use crate::services::normalizer::compact_name;
use crate::services::operator::{AliasAnswer, Operator};
use crate::session::MatchSession;
use crate::types::{Candidate, CatalogId, PerformerProfile, PerformerStub};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Whether a remote-to-canonical link may be adopted without asking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasTrust {
    Trusted,
    NeedsConfirmation,
    Untrusted,
}

/// Trust policy for a remote performer name linked to a canonical profile
pub fn alias_trust(
    remote_name: &str,
    corroborated: bool,
    trust_remote_aliases: bool,
    confirm_questionable_aliases: bool,
) -> AliasTrust {
    let single_name = !remote_name.trim().contains(char::is_whitespace);
    if corroborated || single_name || trust_remote_aliases {
        AliasTrust::Trusted
    } else if confirm_questionable_aliases {
        AliasTrust::NeedsConfirmation
    } else {
        AliasTrust::Untrusted
    }
}

/// `Name (Site)`
pub fn site_suffixed(name: &str, site: &str) -> String {
    format!("{} ({})", name, site)
}

/// True when either name appears in the other's alias set, plain or
/// decorated with the site suffix. Membership is case-sensitive.
pub fn aliases_intersect(
    first: &str,
    first_aliases: &BTreeSet<String>,
    second: &str,
    second_aliases: &BTreeSet<String>,
    site: &str,
) -> bool {
    if second_aliases.contains(first) || first_aliases.contains(second) {
        return true;
    }
    if site.is_empty() {
        return false;
    }
    second_aliases.contains(&site_suffixed(first, site))
        || first_aliases.contains(&site_suffixed(second, site))
}

/// Performers resolved for one scene
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformerResolution {
    pub performer_ids: Vec<CatalogId>,
    /// Names for the title prefix, in stub order
    pub title_names: Vec<String>,
    /// Bookkeeping tags to add (unconfirmed alias, per-performer ambiguity)
    pub tag_names: Vec<String>,
}

impl PerformerResolution {
    fn add_id(&mut self, id: CatalogId) {
        if !self.performer_ids.contains(&id) {
            self.performer_ids.push(id);
        }
    }

    fn add_title_name(&mut self, name: &str) {
        if !self.title_names.iter().any(|n| n == name) {
            self.title_names.push(name.to_string());
        }
    }

    fn add_tag(&mut self, tag: Option<String>) {
        if let Some(tag) = tag {
            if !self.tag_names.contains(&tag) {
                self.tag_names.push(tag);
            }
        }
    }
}

pub struct PerformerResolver<'a> {
    config: &'a ScrapeConfig,
    tags: &'a TagNames,
    catalog: &'a dyn CatalogClient,
    fetcher: &'a CandidateFetcher,
    images: Option<&'a ImageNormalizer>,
}

impl<'a> PerformerResolver<'a> {
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

    /// Resolve every performer of `candidate`. `source_text` is the scene
    /// path and title; a name found there counts as human confirmation.
    pub async fn resolve(
        &self,
        session: &mut MatchSession,
        operator: &mut dyn Operator,
        candidate: &Candidate,
        source_text: &str,
    ) -> ScrapeResult<PerformerResolution> {
        let site = match candidate.studio_name() {
            Some(name) if self.config.compact_studio_names => compact_name(name),
            Some(name) => name.to_string(),
            None => String::new(),
        };
        let source_lower = source_text.to_lowercase();
        let mut resolution = PerformerResolution::default();

        for stub in &candidate.performers {
            let non_female = stub.is_known_non_female();
            let named_in_source = source_lower.contains(&stub.name.to_lowercase());
            if self.config.only_add_female_performers && non_female && !named_in_source {
                debug!(performer = %stub.name, "Skipping non-female performer");
                continue;
            }
            let in_title = self.config.male_performers_in_title || !non_female;

            self.resolve_one(session, operator, stub, &site, named_in_source, in_title, &mut resolution)
                .await?;
        }

        Ok(resolution)
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_one(
        &self,
        session: &mut MatchSession,
        operator: &mut dyn Operator,
        stub: &PerformerStub,
        site: &str,
        named_in_source: bool,
        in_title: bool,
        resolution: &mut PerformerResolution,
    ) -> ScrapeResult<()> {
        let performer_name = self.display_name(&stub.name, site);

        if let Some(existing) = self.catalog.find_performer(&performer_name).await? {
            resolution.add_id(existing.id);
            if in_title {
                resolution.add_title_name(&performer_name);
            }
            return Ok(());
        }

        let Some(parent) = &stub.parent else {
            return self
                .resolve_unlinked(stub, &performer_name, named_in_source, in_title, resolution)
                .await;
        };

        let known = session.is_known_alias(&parent.name, &stub.name)
            || session.is_known_alias(&parent.name, &site_suffixed(&stub.name, site));
        let mut trust = alias_trust(
            &stub.name,
            known,
            self.config.trust_remote_aliases,
            self.config.confirm_questionable_aliases,
        );
        if trust != AliasTrust::Trusted && self.are_aliases(session, &stub.name, &parent.name, site).await? {
            trust = AliasTrust::Trusted;
        }

        let mut profile = parent.clone();
        let confirmed_alias = match trust {
            AliasTrust::Trusted => None,
            AliasTrust::NeedsConfirmation => {
                let answer = operator.confirm_alias(&stub.name, &parent.name, site);
                let alias = match answer {
                    AliasAnswer::No => {
                        info!(performer = %stub.name, parent = %parent.name, "Alias declined by operator");
                        return Ok(());
                    }
                    AliasAnswer::Yes | AliasAnswer::Always => stub.name.clone(),
                    AliasAnswer::AlwaysForSite => site_suffixed(&stub.name, site),
                };
                if matches!(answer, AliasAnswer::Always | AliasAnswer::AlwaysForSite) {
                    session.register_alias(&parent.name, &alias);
                }
                if !profile.aliases.contains(&alias) {
                    profile.aliases.push(alias.clone());
                }
                Some(alias)
            }
            AliasTrust::Untrusted => {
                warn!(
                    performer = %stub.name,
                    parent = %parent.name,
                    "Performer is linked to a canonical name that could not be verified; tagging scene"
                );
                resolution.add_tag(self.tags.unconfirmed_alias.clone());
                if named_in_source {
                    resolution.add_title_name(&performer_name);
                }
                return Ok(());
            }
        };

        // Adopt the canonical name
        match self.catalog.find_performer(&parent.name).await? {
            Some(existing) => {
                if let Some(alias) = confirmed_alias {
                    if !existing.aliases.contains(&alias) {
                        let mut aliases = existing.aliases.clone();
                        aliases.push(alias);
                        self.catalog.update_performer_aliases(&existing.id, &aliases).await?;
                    }
                }
                resolution.add_id(existing.id);
                if in_title {
                    resolution.add_title_name(&parent.name);
                }
            }
            None if self.config.add_performers => {
                let name = self.display_name(&parent.name, site);
                profile.name = name.clone();
                let created = self.create_performer(&profile, stub).await?;
                resolution.add_id(created);
                if in_title {
                    resolution.add_title_name(&name);
                }
            }
            None => debug!(performer = %parent.name, "Performer not in catalog and adding is disabled"),
        }
        Ok(())
    }

    async fn resolve_unlinked(
        &self,
        stub: &PerformerStub,
        performer_name: &str,
        named_in_source: bool,
        in_title: bool,
        resolution: &mut PerformerResolution,
    ) -> ScrapeResult<()> {
        if self.config.tag_ambiguous_performers {
            info!(
                performer = %performer_name,
                "Performer not in catalog and not linked to a known multi-site performer; tagging scene"
            );
            resolution.add_tag(self.tags.ambiguous_performer(performer_name));
            if named_in_source {
                resolution.add_title_name(performer_name);
            }
        } else if self.config.add_ambiguous_performers && self.config.add_performers {
            let profile = PerformerProfile {
                remote_id: stub.remote_id.clone(),
                name: performer_name.to_string(),
                gender: stub.gender,
                ..Default::default()
            };
            let created = self.create_performer(&profile, stub).await?;
            resolution.add_id(created);
            if in_title {
                resolution.add_title_name(performer_name);
            }
        }
        Ok(())
    }

    /// Single-word names optionally get the site suffix
    fn display_name(&self, name: &str, site: &str) -> String {
        if self.config.suffix_singlename_performers && !site.is_empty() && !name.contains(char::is_whitespace) {
            site_suffixed(name, site)
        } else {
            name.to_string()
        }
    }

    /// Independent corroboration of an alias link from the catalog, the
    /// enrichment source, the provider's own profiles and this run's
    /// confirmations
    pub async fn are_aliases(
        &self,
        session: &mut MatchSession,
        first: &str,
        second: &str,
        site: &str,
    ) -> ScrapeResult<bool> {
        if first.eq_ignore_ascii_case(second) {
            return Ok(true);
        }
        let first_aliases = self.collect_aliases(session, first).await?;
        let second_aliases = self.collect_aliases(session, second).await?;
        Ok(aliases_intersect(first, &first_aliases, second, &second_aliases, site))
    }

    async fn collect_aliases(&self, session: &mut MatchSession, name: &str) -> ScrapeResult<BTreeSet<String>> {
        let mut aliases: BTreeSet<String> = session.aliases_of(name).map(str::to_string).collect();
        aliases.insert(name.to_string());

        match self.catalog.find_performer(name).await {
            Ok(Some(record)) => aliases.extend(record.aliases),
            Ok(None) => {}
            Err(e) => warn!(performer = %name, error = %e, "Catalog alias lookup failed"),
        }
        match self.catalog.scrape_performer_enrichment(name).await {
            Ok(Some(enrichment)) => aliases.extend(enrichment.aliases),
            Ok(None) => {}
            Err(e) => warn!(performer = %name, error = %e, "Enrichment alias lookup failed"),
        }
        if let Some(profile) = self.fetcher.performer_by_name(session, name).await? {
            aliases.extend(profile.aliases);
        }
        Ok(aliases)
    }

    async fn create_performer(&self, profile: &PerformerProfile, stub: &PerformerStub) -> ScrapeResult<CatalogId> {
        let mut performer = NewPerformer {
            name: profile.name.clone(),
            aliases: profile
                .aliases
                .iter()
                .filter(|a| **a != profile.name)
                .cloned()
                .collect(),
            gender: profile.gender.or(stub.gender),
            birthdate: profile.birthdate.clone(),
            measurements: profile.measurements.clone(),
            tattoos: profile.tattoos.clone(),
            piercings: profile.piercings.clone(),
            country: profile.nationality.clone(),
            details: profile.details.clone(),
            url: None,
            image: None,
        };

        if self.config.scrape_performers_freeones {
            match self.catalog.scrape_performer_enrichment(&profile.name).await {
                Ok(Some(enrichment)) => performer.merge_missing(enrichment),
                Ok(None) => {}
                Err(e) => warn!(performer = %profile.name, error = %e, "Performer enrichment failed"),
            }
        }

        if let Some(image) = self.portrait(profile).await {
            performer.image = Some(image);
        }

        info!(performer = %performer.name, "Did not find performer in catalog, adding it");
        Ok(self.catalog.create_performer(&performer).await?.id)
    }

    /// Portrait site first, then the provider's own image
    async fn portrait(&self, profile: &PerformerProfile) -> Option<String> {
        let images = self.images?;
        let mut urls = Vec::new();
        if self.config.get_images_from_portrait_site {
            urls.push(self.config.portrait_url(&profile.name));
        }
        if let Some(image) = profile.image.as_ref().filter(|i| !is_placeholder_image(i)) {
            urls.push(image.clone());
        }

        for url in urls {
            match images.fetch_data_uri(&url).await {
                Ok(uri) => return Some(uri),
                Err(e) => debug!(url = %url, error = %e, "Portrait unavailable"),
            }
        }
        None
    }
}
