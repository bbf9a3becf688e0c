//! ThePornDB REST adapter

use super::{de_opt_id, ProviderAdapter, ProviderHttp};
use crate::error::ProviderError;
use crate::services::image_normalizer::is_placeholder_image;
use crate::types::{
    parse_remote_date, Candidate, Gender, PerformerProfile, PerformerStub, RemoteStudio, SearchHits,
    SearchKind, TextMode,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::warn;

static COMPACT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{8}").expect("compact date regex should compile"));

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct TpdbExtras {
    gender: Option<String>,
    birthday: Option<String>,
    measurements: Option<String>,
    tattoos: Option<String>,
    piercings: Option<String>,
    nationality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TpdbPerformer {
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    aliases: Option<Vec<String>>,
    image: Option<String>,
    bio: Option<String>,
    /// Canonical records carry `extras`, scene stubs carry `extra`
    extras: Option<TpdbExtras>,
    extra: Option<TpdbExtras>,
    parent: Option<Box<TpdbPerformer>>,
}

impl TpdbPerformer {
    fn gender(&self) -> Option<Gender> {
        self.extras
            .as_ref()
            .or(self.extra.as_ref())
            .and_then(|e| e.gender.as_deref())
            .and_then(Gender::from_remote)
    }

    fn into_profile(self) -> PerformerProfile {
        let gender = self.gender();
        let extras = self.extras.or(self.extra).unwrap_or_default();
        PerformerProfile {
            remote_id: self.id,
            name: self.name,
            aliases: self.aliases.unwrap_or_default(),
            gender,
            birthdate: extras.birthday,
            measurements: extras.measurements,
            tattoos: extras.tattoos,
            piercings: extras.piercings,
            nationality: extras.nationality,
            details: self.bio,
            image: self.image.filter(|i| !is_placeholder_image(i)),
        }
    }

    fn into_stub(self) -> PerformerStub {
        let gender = self.gender();
        PerformerStub {
            remote_id: self.id,
            name: self.name,
            gender,
            parent: self.parent.map(|p| p.into_profile()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TpdbSite {
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
    name: String,
    url: Option<String>,
    logo: Option<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    parent_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    network_id: Option<String>,
}

impl From<TpdbSite> for RemoteStudio {
    fn from(site: TpdbSite) -> Self {
        let parent_ref = RemoteStudio::parent_ref_from_ids(
            site.id.as_deref(),
            site.parent_id.as_deref(),
            site.network_id.as_deref(),
        );
        RemoteStudio {
            id: site.id,
            name: site.name,
            url: site.url,
            logo: site.logo.filter(|l| !is_placeholder_image(l)),
            details: site.description,
            is_network: false,
            parent: None,
            parent_ref,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TpdbTag {
    #[serde(alias = "tag")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct TpdbBackground {
    full: Option<String>,
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TpdbScene {
    #[serde(default, deserialize_with = "de_opt_id")]
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    external_id: Option<String>,
    site: Option<TpdbSite>,
    #[serde(default)]
    performers: Vec<TpdbPerformer>,
    #[serde(default)]
    tags: Vec<TpdbTag>,
    background: Option<TpdbBackground>,
}

impl From<TpdbScene> for Candidate {
    fn from(scene: TpdbScene) -> Self {
        let cover_image = scene
            .background
            .and_then(|b| b.full.or(b.large))
            .filter(|c| !is_placeholder_image(c));
        Candidate {
            remote_id: scene.id,
            title: scene.title.unwrap_or_default(),
            date: scene.date.as_deref().and_then(parse_remote_date),
            clip_id: scene.external_id,
            studio: scene.site.map(RemoteStudio::from),
            performers: scene.performers.into_iter().map(TpdbPerformer::into_stub).collect(),
            tags: scene.tags.into_iter().map(|t| t.name).collect(),
            cover_image,
            url: scene.url,
            details: scene.description,
        }
    }
}

/// The API matches `YYYY-MM-DD` better than a compact `YYYYMMDD` token
pub fn expand_compact_date(query: &str) -> String {
    let Some(found) = COMPACT_DATE.find(query) else {
        return query.to_string();
    };
    let token = found.as_str();
    if !(token.starts_with("200") || token.starts_with("201") || token.starts_with("202")) {
        return query.to_string();
    }
    match NaiveDate::parse_from_str(token, "%Y%m%d") {
        Ok(date) => query.replacen(token, &date.format("%Y-%m-%d").to_string(), 1),
        Err(_) => query.to_string(),
    }
}

pub struct ThePornDbAdapter {
    http: ProviderHttp,
    base_url: String,
    api_key: String,
}

impl ThePornDbAdapter {
    pub fn new(http: ProviderHttp, base_url: &str, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(error = %e, "ThePornDB API key is not a valid header value"),
        }
        headers
    }

    async fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let envelope: Envelope<T> = self.http.get_json(&url, query, self.headers()).await?;
        Ok(envelope.data)
    }

    async fn scene_by_id(&self, id: &str) -> Result<Candidate, ProviderError> {
        let scene: TpdbScene = self.get_data(&format!("/scenes/{}", id), &[]).await?;
        Ok(scene.into())
    }

    async fn performer_by_id(&self, id: &str) -> Result<PerformerProfile, ProviderError> {
        let performer: TpdbPerformer = self.get_data(&format!("/performers/{}", id), &[]).await?;
        Ok(performer.into_profile())
    }
}

#[async_trait]
impl ProviderAdapter for ThePornDbAdapter {
    fn name(&self) -> &str {
        "ThePornDB"
    }

    async fn search(&self, kind: &SearchKind) -> Result<SearchHits, ProviderError> {
        match kind {
            SearchKind::Text { query, mode } => {
                let query = expand_compact_date(query);
                let param = match mode {
                    TextMode::Parsed => "parse",
                    TextMode::Plain => "q",
                };
                let scenes: Vec<TpdbScene> = self.get_data("/scenes", &[(param, query.as_str())]).await?;
                Ok(SearchHits::Scenes(scenes.into_iter().map(Candidate::from).collect()))
            }
            SearchKind::ExternalId(id) => Ok(SearchHits::Scenes(vec![self.scene_by_id(id).await?])),
            SearchKind::PerformerId(id) => {
                Ok(SearchHits::Performers(vec![self.performer_by_id(id).await?]))
            }
            SearchKind::PerformerName(name) => {
                let found: Vec<TpdbPerformer> =
                    self.get_data("/performers", &[("q", name.as_str())]).await?;
                match found.into_iter().find_map(|p| p.id) {
                    Some(id) => Ok(SearchHits::Performers(vec![self.performer_by_id(&id).await?])),
                    None => Ok(SearchHits::Performers(Vec::new())),
                }
            }
            SearchKind::StudioSlug(id) => {
                let site: TpdbSite = self.get_data(&format!("/sites/{}", id), &[]).await?;
                Ok(SearchHits::Studios(vec![site.into()]))
            }
        }
    }

    async fn scene_details(&self, candidate: &Candidate) -> Result<Option<Candidate>, ProviderError> {
        match &candidate.remote_id {
            Some(id) => Ok(Some(self.scene_by_id(id).await?)),
            None => Ok(None),
        }
    }

    fn text_modes(&self) -> &'static [TextMode] {
        &[TextMode::Parsed, TextMode::Plain]
    }
}
