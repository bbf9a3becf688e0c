//! Local catalog access
//!
//! The engine talks to the catalog through [`CatalogClient`]; the
//! production implementation is the Stash GraphQL client in [`stash`].

pub mod stash;

use crate::error::CatalogError;
use crate::types::{CatalogId, Gender, LocalScene, SceneUpdate};
use async_trait::async_trait;
use serde::Serialize;

pub use stash::StashClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: CatalogId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioRecord {
    pub id: CatalogId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformerRecord {
    pub id: CatalogId,
    pub name: String,
    pub aliases: Vec<String>,
}

/// Studio to create
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewStudio {
    pub name: String,
    pub url: Option<String>,
    pub details: Option<String>,
    /// `data:` URI
    pub image: Option<String>,
    pub parent_id: Option<CatalogId>,
}

/// Performer to create (or enrichment returned by a catalog-side scraper)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPerformer {
    pub name: String,
    pub aliases: Vec<String>,
    pub gender: Option<Gender>,
    pub birthdate: Option<String>,
    pub measurements: Option<String>,
    pub tattoos: Option<String>,
    pub piercings: Option<String>,
    pub country: Option<String>,
    pub details: Option<String>,
    pub url: Option<String>,
    /// `data:` URI
    pub image: Option<String>,
}

impl NewPerformer {
    /// Fill empty fields from `other` and union the alias lists
    pub fn merge_missing(&mut self, other: NewPerformer) {
        fn fill(slot: &mut Option<String>, value: Option<String>) {
            if slot.as_deref().map_or(true, |s| s.trim().is_empty()) {
                *slot = value.filter(|v| !v.trim().is_empty());
            }
        }
        fill(&mut self.birthdate, other.birthdate);
        fill(&mut self.measurements, other.measurements);
        fill(&mut self.tattoos, other.tattoos);
        fill(&mut self.piercings, other.piercings);
        fill(&mut self.country, other.country);
        fill(&mut self.details, other.details);
        fill(&mut self.url, other.url);
        fill(&mut self.image, other.image);
        self.gender = self.gender.or(other.gender);
        for alias in other.aliases {
            if alias != self.name && !self.aliases.contains(&alias) {
                self.aliases.push(alias);
            }
        }
    }
}

/// Scene selection for a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneFilter {
    pub query: Option<String>,
    pub required_tag_ids: Vec<CatalogId>,
    pub excluded_tag_ids: Vec<CatalogId>,
    pub path_includes: Option<String>,
    /// `Some(false)` selects unorganized scenes only
    pub organized: Option<bool>,
    pub without_stash_id: bool,
    pub max_scenes: Option<usize>,
    pub sort: Option<String>,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn find_scenes(&self, filter: &SceneFilter) -> Result<Vec<LocalScene>, CatalogError>;

    /// Editable projection of a scene
    fn build_update(&self, scene: &LocalScene) -> SceneUpdate {
        SceneUpdate::from_scene(scene)
    }

    /// Persist an update; a scene without id is created
    async fn commit_scene(&self, update: &SceneUpdate) -> Result<CatalogId, CatalogError>;

    async fn find_tag(&self, name: &str) -> Result<Option<TagRecord>, CatalogError>;
    async fn create_tag(&self, name: &str) -> Result<TagRecord, CatalogError>;

    async fn find_studio(&self, name: &str) -> Result<Option<StudioRecord>, CatalogError>;
    async fn create_studio(&self, studio: &NewStudio) -> Result<StudioRecord, CatalogError>;

    /// Exact name, falling back to an exact alias
    async fn find_performer(&self, name: &str) -> Result<Option<PerformerRecord>, CatalogError>;
    async fn create_performer(&self, performer: &NewPerformer) -> Result<PerformerRecord, CatalogError>;
    async fn update_performer_aliases(&self, id: &str, aliases: &[String]) -> Result<(), CatalogError>;

    /// Secondary enrichment record from the catalog's fixed external scraper
    async fn scrape_performer_enrichment(&self, name: &str) -> Result<Option<NewPerformer>, CatalogError>;

    /// Block until the catalog's background job queue is empty
    async fn wait_for_idle(&self) -> Result<(), CatalogError>;

    async fn find_or_create_tag(&self, name: &str) -> Result<TagRecord, CatalogError> {
        match self.find_tag(name).await? {
            Some(tag) => Ok(tag),
            None => {
                tracing::info!(tag = %name, "Creating tag");
                self.create_tag(name).await
            }
        }
    }

    async fn find_or_create_studio(&self, studio: &NewStudio) -> Result<StudioRecord, CatalogError> {
        match self.find_studio(&studio.name).await? {
            Some(existing) => Ok(existing),
            None => {
                tracing::info!(studio = %studio.name, "Did not find studio in catalog, adding it");
                self.create_studio(studio).await
            }
        }
    }

    async fn find_or_create_performer(&self, performer: &NewPerformer) -> Result<PerformerRecord, CatalogError> {
        match self.find_performer(&performer.name).await? {
            Some(existing) => Ok(existing),
            None => {
                tracing::info!(performer = %performer.name, "Did not find performer in catalog, adding it");
                self.create_performer(performer).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_fills_gaps_and_unions_aliases() {
        let mut base = NewPerformer {
            name: "Jane Doe".into(),
            aliases: vec!["JD".into()],
            tattoos: Some(String::new()),
            country: Some("US".into()),
            ..Default::default()
        };
        base.merge_missing(NewPerformer {
            name: "Jane Doe".into(),
            aliases: vec!["JD".into(), "Janey".into(), "Jane Doe".into()],
            tattoos: Some("Left arm".into()),
            country: Some("Canada".into()),
            gender: Some(Gender::Female),
            ..Default::default()
        });
        assert_eq!(base.aliases, vec!["JD", "Janey"]);
        assert_eq!(base.tattoos.as_deref(), Some("Left arm"));
        assert_eq!(base.country.as_deref(), Some("US"));
        assert_eq!(base.gender, Some(Gender::Female));
    }
}
