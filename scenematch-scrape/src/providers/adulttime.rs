//! AdultTime adapter (hosted search multi-query API)

use super::credentials::Credentials;
use super::{de_opt_id, ProviderAdapter, ProviderHttp};
use crate::error::ProviderError;
use crate::types::{
    parse_remote_date, Candidate, Gender, ParentRef, PerformerProfile, PerformerStub, RemoteStudio,
    SearchHits, SearchKind,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SCENES_INDEX: &str = "all_scenes_latest_desc";
const ACTORS_INDEX: &str = "all_actors";
const CHANNELS_INDEX: &str = "all_channels";
const MOVIE_IMAGE_BASE: &str = "https://images03-fame.gammacdn.com/movies";
const ACTOR_IMAGE_BASE: &str = "https://transform.gammacdn.com/actors";
const MEMBERS_BASE: &str = "https://members.adulttime.com";

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</br>|<br\s*/?>").expect("line break regex should compile"));
static EMBEDDED_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d+)/*").expect("embedded id regex should compile"));

#[derive(Serialize)]
struct MultiQuery<'a> {
    requests: [IndexQuery<'a>; 1],
}

#[derive(Serialize)]
struct IndexQuery<'a> {
    #[serde(rename = "indexName")]
    index_name: &'a str,
    params: String,
    #[serde(rename = "facetFilters", skip_serializing_if = "Vec::is_empty")]
    facet_filters: Vec<String>,
}

#[derive(Deserialize)]
struct MultiResult<T> {
    results: Vec<IndexResult<T>>,
}

#[derive(Deserialize)]
struct IndexResult<T> {
    #[serde(default = "Vec::new")]
    hits: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct PictureSet {
    #[serde(default)]
    top: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScenePictures {
    nsfw: Option<PictureSet>,
    sfw: Option<PictureSet>,
}

#[derive(Debug, Deserialize)]
struct AtActorRef {
    #[serde(default, deserialize_with = "de_opt_id")]
    actor_id: Option<String>,
    name: String,
    gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtCategory {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtScene {
    #[serde(default, deserialize_with = "de_opt_id")]
    clip_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    release_date: Option<String>,
    sitename: Option<String>,
    sitename_pretty: Option<String>,
    serie_name: Option<String>,
    network_name: Option<String>,
    #[serde(rename = "mainChannelName")]
    main_channel_name: Option<String>,
    url_title: Option<String>,
    member_url: Option<String>,
    #[serde(default)]
    actors: Vec<AtActorRef>,
    #[serde(default)]
    categories: Vec<AtCategory>,
    pictures: Option<ScenePictures>,
}

#[derive(Debug, Deserialize)]
struct AtActor {
    #[serde(default, deserialize_with = "de_opt_id")]
    actor_id: Option<String>,
    name: String,
    gender: Option<String>,
    description: Option<String>,
    #[serde(default)]
    pictures: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AtAvatar {
    src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtChannel {
    slug: Option<String>,
    name: String,
    tagline: Option<String>,
    avatar: Option<AtAvatar>,
    #[serde(rename = "parentChannel")]
    parent_channel: Option<String>,
    #[serde(rename = "channelType")]
    channel_type: Option<String>,
}

impl From<AtChannel> for RemoteStudio {
    fn from(channel: AtChannel) -> Self {
        let parent_ref = channel
            .parent_channel
            .filter(|p| !p.is_empty() && Some(p) != channel.slug.as_ref())
            .map(ParentRef::Parent);
        RemoteStudio {
            id: channel.slug,
            name: channel.name,
            url: None,
            logo: channel
                .avatar
                .and_then(|a| a.src)
                .map(|src| if src.starts_with("//") { format!("http:{}", src) } else { src }),
            details: channel.tagline,
            is_network: channel.channel_type.as_deref() == Some("network"),
            parent: None,
            parent_ref,
        }
    }
}

impl From<AtActor> for PerformerProfile {
    fn from(actor: AtActor) -> Self {
        PerformerProfile {
            remote_id: actor.actor_id,
            name: actor.name,
            gender: actor.gender.as_deref().and_then(Gender::from_remote),
            details: actor.description,
            image: actor
                .pictures
                .get("500x750")
                .map(|path| format!("{}{}", ACTOR_IMAGE_BASE, path)),
            ..Default::default()
        }
    }
}

/// Widest picture of a set, keyed by `WIDTHxHEIGHT`
fn widest(set: &PictureSet) -> Option<&String> {
    set.top
        .iter()
        .max_by_key(|(size, _)| {
            size.split('x')
                .next()
                .and_then(|w| w.parse::<u32>().ok())
                .unwrap_or(0)
        })
        .map(|(_, path)| path)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<AtScene> for Candidate {
    fn from(scene: AtScene) -> Self {
        let studio_name = non_empty(scene.main_channel_name)
            .or_else(|| non_empty(scene.network_name.clone()))
            .or_else(|| non_empty(scene.sitename_pretty))
            .or_else(|| non_empty(scene.serie_name));

        let studio = studio_name.map(|name| {
            let parent = non_empty(scene.network_name)
                .filter(|network| *network != name)
                .map(|network| {
                    Box::new(RemoteStudio {
                        is_network: true,
                        ..RemoteStudio::named(network)
                    })
                });
            RemoteStudio {
                id: scene.sitename.clone(),
                parent,
                ..RemoteStudio::named(name)
            }
        });

        let cover_image = scene.pictures.as_ref().and_then(|p| {
            p.nsfw
                .as_ref()
                .and_then(widest)
                .or_else(|| p.sfw.as_ref().and_then(widest))
                .map(|path| format!("{}{}", MOVIE_IMAGE_BASE, path))
        });

        let url = scene.member_url.or_else(|| {
            match (&scene.sitename, &scene.url_title, &scene.clip_id) {
                (Some(site), Some(slug), Some(id)) => {
                    Some(format!("{}/en/video/{}/{}/{}", MEMBERS_BASE, site, slug, id))
                }
                _ => None,
            }
        });

        Candidate {
            remote_id: scene.clip_id.clone(),
            title: scene.title.map(|t| t.trim().to_string()).unwrap_or_default(),
            date: scene.release_date.as_deref().and_then(parse_remote_date),
            clip_id: scene.clip_id,
            studio,
            performers: scene
                .actors
                .into_iter()
                .filter(|a| a.gender.as_deref() == Some("female"))
                .map(|a| PerformerStub {
                    remote_id: a.actor_id,
                    gender: Some(Gender::Female),
                    name: a.name,
                    parent: None,
                })
                .collect(),
            tags: scene.categories.into_iter().filter_map(|c| c.name).collect(),
            cover_image,
            url,
            details: scene.description.map(|d| LINE_BREAK.replace_all(&d, "\n").into_owned()),
        }
    }
}

/// Scene id from a members URL: a numeric last segment, else the first numeric segment
pub fn scene_id_from_url(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
        return Some(last.to_string());
    }
    EMBEDDED_ID.captures(url).map(|caps| caps[1].to_string())
}

/// `&` and `=` would split the params string
fn params_for(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c == '&' || c == '=' { ' ' } else { c })
        .collect();
    format!("query={}&hitsPerPage=20&page=0", cleaned.trim())
}

pub struct AdultTimeAdapter {
    http: ProviderHttp,
    endpoint: String,
}

impl AdultTimeAdapter {
    pub fn new(http: ProviderHttp, credentials: Credentials) -> Self {
        let endpoint = format!(
            "https://{}-dsn.algolia.net/1/indexes/*/queries?x-algolia-application-id={}&x-algolia-api-key={}",
            credentials.app_id.to_lowercase(),
            credentials.app_id,
            credentials.api_key
        );
        Self { http, endpoint }
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("https://members.adulttime.com"));
        headers.insert(REFERER, HeaderValue::from_static("https://members.adulttime.com/"));
        headers
    }

    async fn query<T: DeserializeOwned>(
        &self,
        index_name: &str,
        text: &str,
        facet: Option<String>,
    ) -> Result<Vec<T>, ProviderError> {
        let body = MultiQuery {
            requests: [IndexQuery {
                index_name,
                params: params_for(text),
                facet_filters: facet.into_iter().collect(),
            }],
        };
        let result: MultiResult<T> = self.http.post_json(&self.endpoint, Self::headers(), &body).await?;
        Ok(result.results.into_iter().next().map(|r| r.hits).unwrap_or_default())
    }
}

#[async_trait]
impl ProviderAdapter for AdultTimeAdapter {
    fn name(&self) -> &str {
        "AdultTime"
    }

    async fn search(&self, kind: &SearchKind) -> Result<SearchHits, ProviderError> {
        match kind {
            SearchKind::Text { query, .. } => {
                let hits: Vec<AtScene> = self.query(SCENES_INDEX, query, None).await?;
                Ok(SearchHits::Scenes(hits.into_iter().map(Candidate::from).collect()))
            }
            SearchKind::ExternalId(id) => {
                let hits: Vec<AtScene> = self
                    .query(SCENES_INDEX, "", Some(format!("clip_id:{}", id)))
                    .await?;
                Ok(SearchHits::Scenes(hits.into_iter().map(Candidate::from).collect()))
            }
            SearchKind::PerformerId(id) => {
                let hits: Vec<AtActor> = self
                    .query(ACTORS_INDEX, "", Some(format!("actor_id:{}", id)))
                    .await?;
                Ok(SearchHits::Performers(hits.into_iter().map(PerformerProfile::from).collect()))
            }
            SearchKind::PerformerName(name) => {
                let hits: Vec<AtActor> = self.query(ACTORS_INDEX, name, None).await?;
                Ok(SearchHits::Performers(hits.into_iter().map(PerformerProfile::from).collect()))
            }
            SearchKind::StudioSlug(slug) => {
                let hits: Vec<AtChannel> = self
                    .query(CHANNELS_INDEX, "", Some(format!("slug:{}", slug)))
                    .await?;
                Ok(SearchHits::Studios(hits.into_iter().map(RemoteStudio::from).collect()))
            }
        }
    }

    fn external_id_from_url(&self, url: &str) -> Option<String> {
        scene_id_from_url(url)
    }
}
