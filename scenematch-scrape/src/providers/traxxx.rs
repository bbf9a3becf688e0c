//! Traxxx adapter
//!
//! Self-hosted aggregator with a small REST surface. Scenes link to an
//! `entity` (channel) whose parent chain is inlined, so studio lookups by
//! slug are only needed for ad-hoc resolution.

use super::{de_opt_id, ProviderAdapter, ProviderHttp};
use crate::error::ProviderError;
use crate::services::query_builder::{EpisodeDatePrePass, QueryPrePass};
use crate::types::{
    parse_remote_date, Candidate, Gender, PerformerProfile, PerformerStub, RemoteStudio, SearchHits,
    SearchKind,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::sync::Arc;

const SEARCH_LIMIT: &str = "3";

/// Channels the aggregator files under each other's names
const STUDIO_FAMILIES: &[&[&str]] = &[
    &[
        "pornmegaload",
        "xlgirls",
        "scoreland",
        "18eighteen",
        "50plusmilfs",
        "60plusmilfs",
        "40somethingmag",
    ],
    &[
        "legalporno",
        "analvids",
        "ddfbusty",
        "handsonhardcore",
        "pornworld",
        "eurogirlsongirls",
        "houseoftaboo",
    ],
];

#[derive(Debug, Deserialize)]
struct MediaPath {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TraxxxEntity {
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
    name: String,
    slug: Option<String>,
    url: Option<String>,
    description: Option<String>,
    logo: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    parent: Option<Box<TraxxxEntity>>,
}

#[derive(Debug, Deserialize)]
struct TraxxxActor {
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
    name: String,
    gender: Option<String>,
    #[serde(default)]
    aliases: Vec<TraxxxAlias>,
    #[serde(rename = "dateOfBirth")]
    date_of_birth: Option<String>,
    tattoos: Option<String>,
    piercings: Option<String>,
    description: Option<String>,
    avatar: Option<MediaPath>,
}

/// Aliases come back either as bare strings or as nested actor records
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TraxxxAlias {
    Name(String),
    Record { name: String },
}

impl TraxxxAlias {
    fn into_name(self) -> String {
        match self {
            TraxxxAlias::Name(name) | TraxxxAlias::Record { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TraxxxTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TraxxxScene {
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    url: Option<String>,
    #[serde(rename = "shootId", default, deserialize_with = "de_opt_id")]
    shoot_id: Option<String>,
    entity: Option<TraxxxEntity>,
    #[serde(default)]
    actors: Vec<TraxxxActor>,
    #[serde(default)]
    tags: Vec<TraxxxTag>,
    poster: Option<MediaPath>,
}

#[derive(Debug, Deserialize)]
struct ScenesEnvelope {
    #[serde(default)]
    scenes: Vec<TraxxxScene>,
}

#[derive(Debug, Deserialize)]
struct SceneEnvelope {
    scene: TraxxxScene,
}

#[derive(Debug, Deserialize)]
struct ActorsEnvelope {
    #[serde(default)]
    actors: Vec<TraxxxActor>,
}

#[derive(Debug, Deserialize)]
struct ActorEnvelope {
    actor: TraxxxActor,
}

#[derive(Debug, Deserialize)]
struct EntityEnvelope {
    entity: TraxxxEntity,
}

pub struct TraxxxAdapter {
    http: ProviderHttp,
    server: String,
}

impl TraxxxAdapter {
    pub fn new(http: ProviderHttp, server: &str) -> Self {
        Self {
            http,
            server: server.trim_end_matches('/').to_string(),
        }
    }

    fn media_url(&self, media: Option<MediaPath>) -> Option<String> {
        media
            .and_then(|m| m.path)
            .map(|path| format!("{}/media/{}", self.server, path))
    }

    fn studio(&self, entity: TraxxxEntity) -> RemoteStudio {
        RemoteStudio {
            id: entity.slug.or(entity.id),
            name: entity.name,
            url: entity.url,
            logo: entity
                .logo
                .map(|logo| format!("{}/img/logos/{}", self.server, logo)),
            details: entity.description,
            is_network: entity.kind.as_deref() == Some("network"),
            parent: entity.parent.map(|p| Box::new(self.studio(*p))),
            parent_ref: None,
        }
    }

    fn profile(&self, actor: TraxxxActor) -> PerformerProfile {
        PerformerProfile {
            remote_id: actor.id,
            name: actor.name,
            aliases: actor.aliases.into_iter().map(TraxxxAlias::into_name).collect(),
            gender: actor.gender.as_deref().and_then(Gender::from_remote),
            birthdate: actor.date_of_birth.as_deref().and_then(parse_remote_date).map(|d| d.to_string()),
            measurements: None,
            tattoos: actor.tattoos,
            piercings: actor.piercings,
            nationality: None,
            details: actor.description,
            image: self.media_url(actor.avatar),
        }
    }

    fn candidate(&self, scene: TraxxxScene) -> Candidate {
        Candidate {
            remote_id: scene.id,
            title: scene.title.unwrap_or_default(),
            date: scene.date.as_deref().and_then(parse_remote_date),
            clip_id: scene.shoot_id,
            studio: scene.entity.map(|e| self.studio(e)),
            performers: scene
                .actors
                .into_iter()
                .map(|a| PerformerStub {
                    remote_id: a.id,
                    gender: a.gender.as_deref().and_then(Gender::from_remote),
                    name: a.name,
                    parent: None,
                })
                .collect(),
            tags: scene.tags.into_iter().map(|t| t.name).collect(),
            cover_image: self.media_url(scene.poster),
            url: scene.url,
            details: scene.description,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.server, path);
        self.http.get_json(&url, query, HeaderMap::new()).await
    }

    async fn actor_by_id(&self, id: &str) -> Result<PerformerProfile, ProviderError> {
        let found: ActorEnvelope = self.get(&format!("/api/actors/{}", id), &[]).await?;
        Ok(self.profile(found.actor))
    }
}

/// The search endpoint tokenizes on dots
pub fn dotted_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(".")
}

#[async_trait]
impl ProviderAdapter for TraxxxAdapter {
    fn name(&self) -> &str {
        "Traxxx"
    }

    async fn search(&self, kind: &SearchKind) -> Result<SearchHits, ProviderError> {
        match kind {
            SearchKind::Text { query, .. } => {
                let q = dotted_query(query);
                let found: ScenesEnvelope = self
                    .get("/api/scenes", &[("limit", SEARCH_LIMIT), ("q", q.as_str())])
                    .await?;
                Ok(SearchHits::Scenes(
                    found.scenes.into_iter().map(|s| self.candidate(s)).collect(),
                ))
            }
            SearchKind::ExternalId(id) => {
                let found: SceneEnvelope = self.get(&format!("/api/scenes/{}", id), &[]).await?;
                Ok(SearchHits::Scenes(vec![self.candidate(found.scene)]))
            }
            SearchKind::PerformerId(id) => Ok(SearchHits::Performers(vec![self.actor_by_id(id).await?])),
            SearchKind::PerformerName(name) => {
                let found: ActorsEnvelope = self
                    .get("/api/actors", &[("limit", SEARCH_LIMIT), ("q", name.as_str())])
                    .await?;
                match found.actors.into_iter().find_map(|a| a.id) {
                    Some(id) => Ok(SearchHits::Performers(vec![self.actor_by_id(&id).await?])),
                    None => Ok(SearchHits::Performers(Vec::new())),
                }
            }
            SearchKind::StudioSlug(slug) => {
                let found: EntityEnvelope = self.get(&format!("/api/entities/{}", slug), &[]).await?;
                Ok(SearchHits::Studios(vec![self.studio(found.entity)]))
            }
        }
    }

    fn studio_families(&self) -> &'static [&'static [&'static str]] {
        STUDIO_FAMILIES
    }

    fn query_pre_pass(&self) -> Option<Arc<dyn QueryPrePass>> {
        Some(Arc::new(EpisodeDatePrePass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn adapter() -> TraxxxAdapter {
        TraxxxAdapter::new(ProviderHttp::new(0, 1, 1).unwrap(), "https://traxxx.local/")
    }

    #[test]
    fn scene_maps_entity_chain_and_media() {
        let raw = serde_json::json!({
            "scenes": [{
                "id": 991,
                "title": "Late Checkout",
                "date": "2020-11-02T00:00:00.000Z",
                "shootId": "LC-07",
                "poster": { "path": "posters/991.jpeg" },
                "entity": {
                    "id": 5, "name": "Hotel Stories", "slug": "hotelstories", "type": "channel",
                    "logo": "hotelstories/logo.png",
                    "parent": { "id": 1, "name": "Big Network", "slug": "bignetwork", "type": "network" }
                },
                "actors": [
                    { "id": 10, "name": "Jane Doe", "gender": "female" },
                    { "id": 11, "name": "John Roe", "gender": "male" }
                ],
                "tags": [{ "name": "hotel" }]
            }]
        });
        let found: ScenesEnvelope = serde_json::from_value(raw).unwrap();
        let adapter = adapter();
        let candidate = adapter.candidate(found.scenes.into_iter().next().unwrap());

        assert_eq!(candidate.remote_id.as_deref(), Some("991"));
        assert_eq!(candidate.clip_id.as_deref(), Some("LC-07"));
        assert_eq!(candidate.date, NaiveDate::from_ymd_opt(2020, 11, 2));
        assert_eq!(
            candidate.cover_image.as_deref(),
            Some("https://traxxx.local/media/posters/991.jpeg")
        );

        let studio = candidate.studio.as_ref().unwrap();
        assert_eq!(studio.id.as_deref(), Some("hotelstories"));
        assert!(!studio.is_network);
        assert_eq!(
            studio.logo.as_deref(),
            Some("https://traxxx.local/img/logos/hotelstories/logo.png")
        );
        let parent = studio.parent.as_ref().unwrap();
        assert_eq!(parent.name, "Big Network");
        assert!(parent.is_network);

        assert_eq!(candidate.female_performer_names(), vec!["Jane Doe"]);
    }

    #[test]
    fn actor_profile_reads_aliases_in_both_shapes() {
        let raw = serde_json::json!({
            "actor": {
                "id": 10, "name": "Jane Doe", "gender": "female",
                "aliases": ["JD", { "name": "Janey" }],
                "dateOfBirth": "1990-05-06T00:00:00.000Z",
                "avatar": { "path": "actors/jane.jpeg" }
            }
        });
        let found: ActorEnvelope = serde_json::from_value(raw).unwrap();
        let profile = adapter().profile(found.actor);
        assert_eq!(profile.aliases, vec!["JD", "Janey"]);
        assert_eq!(profile.birthdate.as_deref(), Some("1990-05-06"));
        assert_eq!(profile.image.as_deref(), Some("https://traxxx.local/media/actors/jane.jpeg"));
    }

    #[test]
    fn queries_are_dotted() {
        assert_eq!(dotted_query("Hotel Stories  late checkout"), "Hotel.Stories.late.checkout");
    }

    #[test]
    fn families_and_pre_pass_are_provided() {
        let adapter = adapter();
        assert_eq!(adapter.studio_families().len(), 2);
        assert!(adapter.query_pre_pass().is_some());
    }
}
