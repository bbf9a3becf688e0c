//! Core data model shared by the engine, the providers and the catalog

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque catalog record id
pub type CatalogId = String;

/// Studio as referenced from a catalog scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioLink {
    pub id: CatalogId,
    pub name: String,
}

/// A catalog scene under reconciliation.
///
/// `id == None` means the scene is not in the catalog yet and is being
/// imported from its URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalScene {
    pub id: Option<CatalogId>,
    pub path: String,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub studio: Option<StudioLink>,
    pub url: Option<String>,
    pub details: Option<String>,
    pub tag_ids: BTreeSet<CatalogId>,
    pub performer_ids: BTreeSet<CatalogId>,
}

impl LocalScene {
    pub fn studio_name(&self) -> Option<&str> {
        self.studio.as_ref().map(|s| s.name.as_str())
    }

    /// Title when present and non-blank
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Short label for progress lines
    pub fn label(&self) -> &str {
        if self.path.is_empty() {
            self.url.as_deref().unwrap_or("<unnamed scene>")
        } else {
            &self.path
        }
    }
}

/// Editable projection of a scene, committed back to the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneUpdate {
    pub id: Option<CatalogId>,
    pub title: Option<String>,
    pub details: Option<String>,
    pub date: Option<NaiveDate>,
    pub url: Option<String>,
    /// `data:` URI of a JPEG cover
    pub cover_image: Option<String>,
    pub studio_id: Option<CatalogId>,
    pub tag_ids: BTreeSet<CatalogId>,
    pub performer_ids: BTreeSet<CatalogId>,
}

impl SceneUpdate {
    pub fn from_scene(scene: &LocalScene) -> Self {
        Self {
            id: scene.id.clone(),
            title: scene.title.clone(),
            details: scene.details.clone(),
            date: scene.date,
            url: scene.url.clone(),
            cover_image: None,
            studio_id: scene.studio.as_ref().map(|s| s.id.clone()),
            tag_ids: scene.tag_ids.clone(),
            performer_ids: scene.performer_ids.clone(),
        }
    }
}

/// Closed performer gender vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    TransgenderMale,
    TransgenderFemale,
    Intersex,
}

impl Gender {
    /// Map a provider's gender string; unknown values yield `None`
    pub fn from_remote(value: &str) -> Option<Self> {
        let folded = value.trim().to_lowercase().replace(['_', '-'], " ");
        match folded.as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            "transgender male" | "trans male" => Some(Gender::TransgenderMale),
            "transgender female" | "trans female" => Some(Gender::TransgenderFemale),
            "intersex" => Some(Gender::Intersex),
            _ => None,
        }
    }

    /// Catalog enum spelling
    pub fn catalog_value(self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::TransgenderMale => "TRANSGENDER_MALE",
            Gender::TransgenderFemale => "TRANSGENDER_FEMALE",
            Gender::Intersex => "INTERSEX",
        }
    }
}

/// How to reach a studio's parent when it is not inlined in the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// Plain parent studio, looked up by provider id or slug
    Parent(String),
    /// Network-type parent; gets the network suffix when created
    Network(String),
}

/// Studio/site/channel as described by a provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteStudio {
    pub id: Option<String>,
    pub name: String,
    pub url: Option<String>,
    pub logo: Option<String>,
    pub details: Option<String>,
    pub is_network: bool,
    /// Parent inlined by the provider
    pub parent: Option<Box<RemoteStudio>>,
    /// Parent that has to be fetched
    pub parent_ref: Option<ParentRef>,
}

impl RemoteStudio {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Pick the upward link from a provider's declared parent and network
    /// ids. A parent equal to the studio itself or to its own network is
    /// ignored in favor of the network.
    pub fn parent_ref_from_ids(
        id: Option<&str>,
        parent_id: Option<&str>,
        network_id: Option<&str>,
    ) -> Option<ParentRef> {
        if let Some(parent) = parent_id {
            if Some(parent) != id && Some(parent) != network_id {
                return Some(ParentRef::Parent(parent.to_string()));
            }
        }
        match network_id {
            Some(network) if Some(network) != id => Some(ParentRef::Network(network.to_string())),
            _ => None,
        }
    }

    /// Name of the inlined parent, when one was provided
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.name.as_str())
    }
}

/// Full remote performer profile (the canonical identity behind a stub)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformerProfile {
    pub remote_id: Option<String>,
    pub name: String,
    pub aliases: Vec<String>,
    pub gender: Option<Gender>,
    pub birthdate: Option<String>,
    pub measurements: Option<String>,
    pub tattoos: Option<String>,
    pub piercings: Option<String>,
    pub nationality: Option<String>,
    pub details: Option<String>,
    pub image: Option<String>,
}

/// Performer as attached to a remote scene
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformerStub {
    pub remote_id: Option<String>,
    pub name: String,
    pub gender: Option<Gender>,
    /// Canonical identity this site name is linked to
    pub parent: Option<PerformerProfile>,
}

impl PerformerStub {
    pub fn new(name: impl Into<String>, gender: Option<Gender>) -> Self {
        Self {
            name: name.into(),
            gender,
            ..Default::default()
        }
    }

    /// Gender from the canonical profile, else from the stub
    pub fn effective_gender(&self) -> Option<Gender> {
        self.parent
            .as_ref()
            .and_then(|p| p.gender)
            .or(self.gender)
    }

    /// Known to be something other than female; unknown counts as eligible
    pub fn is_known_non_female(&self) -> bool {
        matches!(self.effective_gender(), Some(g) if g != Gender::Female)
    }
}

/// One remote search result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub remote_id: Option<String>,
    pub title: String,
    pub date: Option<NaiveDate>,
    /// Provider clip/shoot identifier fragment
    pub clip_id: Option<String>,
    pub studio: Option<RemoteStudio>,
    pub performers: Vec<PerformerStub>,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub url: Option<String>,
    pub details: Option<String>,
}

impl Candidate {
    pub fn studio_name(&self) -> Option<&str> {
        self.studio.as_ref().map(|s| s.name.as_str())
    }

    /// Performer names used for similarity text and operator prompts
    pub fn female_performer_names(&self) -> Vec<&str> {
        self.performers
            .iter()
            .filter(|p| !p.is_known_non_female())
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// Free-text query flavor; some providers offer a server-side parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Plain,
    Parsed,
}

/// What a provider search is keyed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKind {
    Text { query: String, mode: TextMode },
    ExternalId(String),
    PerformerId(String),
    PerformerName(String),
    StudioSlug(String),
}

impl SearchKind {
    pub fn text(query: impl Into<String>) -> Self {
        SearchKind::Text {
            query: query.into(),
            mode: TextMode::Plain,
        }
    }

    /// Empty result of the shape this search produces
    pub fn empty_hits(&self) -> SearchHits {
        match self {
            SearchKind::Text { .. } | SearchKind::ExternalId(_) => SearchHits::Scenes(Vec::new()),
            SearchKind::PerformerId(_) | SearchKind::PerformerName(_) => {
                SearchHits::Performers(Vec::new())
            }
            SearchKind::StudioSlug(_) => SearchHits::Studios(Vec::new()),
        }
    }
}

/// Uniform provider response after unwrapping
#[derive(Debug, Clone, PartialEq)]
pub enum SearchHits {
    Scenes(Vec<Candidate>),
    Performers(Vec<PerformerProfile>),
    Studios(Vec<RemoteStudio>),
}

impl SearchHits {
    pub fn len(&self) -> usize {
        match self {
            SearchHits::Scenes(v) => v.len(),
            SearchHits::Performers(v) => v.len(),
            SearchHits::Studios(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_scenes(self) -> Vec<Candidate> {
        match self {
            SearchHits::Scenes(v) => v,
            _ => Vec::new(),
        }
    }

    pub fn into_performers(self) -> Vec<PerformerProfile> {
        match self {
            SearchHits::Performers(v) => v,
            _ => Vec::new(),
        }
    }

    pub fn into_studios(self) -> Vec<RemoteStudio> {
        match self {
            SearchHits::Studios(v) => v,
            _ => Vec::new(),
        }
    }
}

/// Parse the date portion of a provider timestamp (`2021-03-04`, `2021-03-04T00:00:00Z`)
pub fn parse_remote_date(value: &str) -> Option<NaiveDate> {
    let head = value.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
