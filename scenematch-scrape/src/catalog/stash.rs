//! Stash GraphQL catalog client

use super::{
    CatalogClient, NewPerformer, NewStudio, PerformerRecord, SceneFilter, StudioRecord, TagRecord,
};
use crate::error::CatalogError;
use crate::types::{parse_remote_date, CatalogId, Gender, LocalScene, SceneUpdate, StudioLink};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const ENRICHMENT_SCRAPER: &str = "Freeones";

const FIND_SCENES: &str = r#"
query FindScenes($filter: FindFilterType, $scene_filter: SceneFilterType) {
  findScenes(filter: $filter, scene_filter: $scene_filter) {
    count
    scenes {
      id title details date urls
      files { path }
      studio { id name }
      tags { id }
      performers { id }
    }
  }
}"#;

const FIND_TAGS: &str = r#"
query FindTags($name: String!) {
  findTags(tag_filter: { name: { value: $name, modifier: EQUALS } }) { tags { id name } }
}"#;

const CREATE_TAG: &str = r#"
mutation TagCreate($name: String!) { tagCreate(input: { name: $name }) { id name } }"#;

const FIND_STUDIOS: &str = r#"
query FindStudios($name: String!) {
  findStudios(studio_filter: { name: { value: $name, modifier: EQUALS } }) { studios { id name } }
}"#;

const CREATE_STUDIO: &str = r#"
mutation StudioCreate($input: StudioCreateInput!) { studioCreate(input: $input) { id name } }"#;

const FIND_PERFORMERS_BY_NAME: &str = r#"
query FindPerformers($name: String!) {
  findPerformers(performer_filter: { name: { value: $name, modifier: EQUALS } }) {
    performers { id name alias_list }
  }
}"#;

const FIND_PERFORMERS_BY_ALIAS: &str = r#"
query FindPerformersByAlias($name: String!) {
  findPerformers(performer_filter: { aliases: { value: $name, modifier: INCLUDES } }) {
    performers { id name alias_list }
  }
}"#;

const CREATE_PERFORMER: &str = r#"
mutation PerformerCreate($input: PerformerCreateInput!) {
  performerCreate(input: $input) { id name alias_list }
}"#;

const UPDATE_PERFORMER: &str = r#"
mutation PerformerUpdate($id: ID!, $aliases: [String!]) {
  performerUpdate(input: { id: $id, alias_list: $aliases }) { id }
}"#;

const SCRAPE_PERFORMER: &str = r#"
query ScrapePerformer($scraper: ID!, $name: String!) {
  scrapeSinglePerformer(source: { scraper_id: $scraper }, input: { query: $name }) {
    name aliases gender birthdate measurements tattoos piercings country details urls images
  }
}"#;

const UPDATE_SCENE: &str = r#"
mutation SceneUpdate($input: SceneUpdateInput!) { sceneUpdate(input: $input) { id } }"#;

const CREATE_SCENE: &str = r#"
mutation SceneCreate($input: SceneCreateInput!) { sceneCreate(input: $input) { id } }"#;

const JOB_QUEUE: &str = r#"query JobQueue { jobQueue { id } }"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IdName {
    id: CatalogId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: CatalogId,
}

#[derive(Debug, Deserialize)]
struct StashFile {
    path: String,
}

#[derive(Debug, Deserialize)]
struct StashScene {
    id: CatalogId,
    title: Option<String>,
    details: Option<String>,
    date: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    files: Vec<StashFile>,
    studio: Option<IdName>,
    #[serde(default)]
    tags: Vec<IdOnly>,
    #[serde(default)]
    performers: Vec<IdOnly>,
}

impl From<StashScene> for LocalScene {
    fn from(s: StashScene) -> Self {
        LocalScene {
            id: Some(s.id),
            path: s.files.into_iter().next().map(|f| f.path).unwrap_or_default(),
            title: s.title.filter(|t| !t.is_empty()),
            date: s.date.as_deref().and_then(parse_remote_date),
            studio: s.studio.map(|st| StudioLink { id: st.id, name: st.name }),
            url: s.urls.into_iter().next(),
            details: s.details.filter(|d| !d.is_empty()),
            tag_ids: s.tags.into_iter().map(|t| t.id).collect(),
            performer_ids: s.performers.into_iter().map(|p| p.id).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StashPerformer {
    id: CatalogId,
    name: String,
    #[serde(default)]
    alias_list: Vec<String>,
}

impl From<StashPerformer> for PerformerRecord {
    fn from(p: StashPerformer) -> Self {
        PerformerRecord {
            id: p.id,
            name: p.name,
            aliases: p.alias_list,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScrapedPerformer {
    name: Option<String>,
    aliases: Option<String>,
    gender: Option<String>,
    birthdate: Option<String>,
    measurements: Option<String>,
    tattoos: Option<String>,
    piercings: Option<String>,
    country: Option<String>,
    details: Option<String>,
    #[serde(default)]
    urls: Option<Vec<String>>,
    #[serde(default)]
    images: Option<Vec<String>>,
}

impl ScrapedPerformer {
    fn into_new_performer(self) -> NewPerformer {
        NewPerformer {
            name: self.name.unwrap_or_default(),
            aliases: self
                .aliases
                .map(|a| split_alias_list(&a))
                .unwrap_or_default(),
            gender: self.gender.as_deref().and_then(Gender::from_remote),
            birthdate: self.birthdate,
            measurements: self.measurements,
            tattoos: self.tattoos,
            piercings: self.piercings,
            country: self.country,
            details: self.details,
            url: self.urls.and_then(|u| u.into_iter().next()),
            image: self.images.and_then(|i| i.into_iter().next()),
        }
    }
}

/// Split a scraper's free-form alias string ("A, B / C")
pub fn split_alias_list(aliases: &str) -> Vec<String> {
    aliases
        .split([',', '/', ';'])
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// GraphQL scene filter variables
fn scene_filter_variables(filter: &SceneFilter) -> Value {
    let mut scene_filter = serde_json::Map::new();
    if !filter.required_tag_ids.is_empty() {
        scene_filter.insert(
            "tags".into(),
            json!({ "value": filter.required_tag_ids, "modifier": "INCLUDES_ALL" }),
        );
    }
    if !filter.excluded_tag_ids.is_empty() {
        scene_filter.insert(
            "NOT".into(),
            json!({ "tags": { "value": filter.excluded_tag_ids, "modifier": "INCLUDES" } }),
        );
    }
    if let Some(path) = &filter.path_includes {
        scene_filter.insert("path".into(), json!({ "value": path, "modifier": "INCLUDES" }));
    }
    if let Some(organized) = filter.organized {
        scene_filter.insert("organized".into(), json!(organized));
    }
    if filter.without_stash_id {
        scene_filter.insert("stash_id".into(), json!({ "value": "", "modifier": "IS_NULL" }));
    }

    let per_page = filter.max_scenes.map(|n| n as i64).unwrap_or(-1);
    let mut find_filter = json!({ "per_page": per_page, "direction": "ASC" });
    if let Some(q) = &filter.query {
        find_filter["q"] = json!(q);
    }
    if let Some(sort) = &filter.sort {
        find_filter["sort"] = json!(sort);
    }

    json!({ "filter": find_filter, "scene_filter": scene_filter })
}

/// Scene update / create input
fn scene_input(update: &SceneUpdate) -> Value {
    let mut input = json!({
        "title": update.title,
        "details": update.details,
        "date": update.date.map(|d| d.format("%Y-%m-%d").to_string()),
        "urls": update.url.iter().collect::<Vec<_>>(),
        "studio_id": update.studio_id,
        "tag_ids": update.tag_ids,
        "performer_ids": update.performer_ids,
    });
    if let Some(cover) = &update.cover_image {
        input["cover_image"] = json!(cover);
    }
    if let Some(id) = &update.id {
        input["id"] = json!(id);
    }
    input
}

fn performer_input(p: &NewPerformer) -> Value {
    json!({
        "name": p.name,
        "alias_list": p.aliases,
        "gender": p.gender.map(Gender::catalog_value),
        "birthdate": p.birthdate,
        "measurements": p.measurements,
        "tattoos": p.tattoos,
        "piercings": p.piercings,
        "country": p.country,
        "details": p.details,
        "urls": p.url.iter().collect::<Vec<_>>(),
        "image": p.image,
    })
}

/// Stash GraphQL client
pub struct StashClient {
    http_client: reqwest::Client,
    endpoint: String,
    idle_poll: Duration,
}

impl StashClient {
    pub fn new(base_url: &str, api_key: Option<&str>, idle_poll: Duration) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| CatalogError::Network(format!("invalid API key header: {}", e)))?;
            headers.insert("ApiKey", value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
            idle_poll,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, CatalogError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Http(status.as_u16(), error_text));
        }

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        if !body.errors.is_empty() {
            return Err(CatalogError::GraphQl(
                body.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        body.data
            .ok_or_else(|| CatalogError::Parse("response without data".to_string()))
    }

    async fn performers_matching(&self, query: &str, name: &str) -> Result<Vec<StashPerformer>, CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "findPerformers")]
            find: Inner,
        }
        #[derive(Deserialize)]
        struct Inner {
            performers: Vec<StashPerformer>,
        }
        let data: Data = self.execute(query, json!({ "name": name })).await?;
        Ok(data.find.performers)
    }
}

#[async_trait]
impl CatalogClient for StashClient {
    async fn find_scenes(&self, filter: &SceneFilter) -> Result<Vec<LocalScene>, CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "findScenes")]
            find: Inner,
        }
        #[derive(Deserialize)]
        struct Inner {
            count: usize,
            scenes: Vec<StashScene>,
        }
        let data: Data = self.execute(FIND_SCENES, scene_filter_variables(filter)).await?;
        debug!(count = data.find.count, returned = data.find.scenes.len(), "Catalog scene query");
        Ok(data.find.scenes.into_iter().map(LocalScene::from).collect())
    }

    async fn commit_scene(&self, update: &SceneUpdate) -> Result<CatalogId, CatalogError> {
        #[derive(Deserialize)]
        struct Updated {
            #[serde(rename = "sceneUpdate")]
            scene: Option<IdOnly>,
        }
        #[derive(Deserialize)]
        struct Created {
            #[serde(rename = "sceneCreate")]
            scene: Option<IdOnly>,
        }

        let variables = json!({ "input": scene_input(update) });
        let id = match &update.id {
            Some(_) => self.execute::<Updated>(UPDATE_SCENE, variables).await?.scene,
            None => self.execute::<Created>(CREATE_SCENE, variables).await?.scene,
        };
        id.map(|s| s.id)
            .ok_or_else(|| CatalogError::NotFound("scene missing from mutation result".to_string()))
    }

    async fn find_tag(&self, name: &str) -> Result<Option<TagRecord>, CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "findTags")]
            find: Inner,
        }
        #[derive(Deserialize)]
        struct Inner {
            tags: Vec<IdName>,
        }
        let data: Data = self.execute(FIND_TAGS, json!({ "name": name })).await?;
        Ok(data
            .find
            .tags
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| TagRecord { id: t.id, name: t.name }))
    }

    async fn create_tag(&self, name: &str) -> Result<TagRecord, CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "tagCreate")]
            tag: IdName,
        }
        let data: Data = self.execute(CREATE_TAG, json!({ "name": name })).await?;
        Ok(TagRecord {
            id: data.tag.id,
            name: data.tag.name,
        })
    }

    async fn find_studio(&self, name: &str) -> Result<Option<StudioRecord>, CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "findStudios")]
            find: Inner,
        }
        #[derive(Deserialize)]
        struct Inner {
            studios: Vec<IdName>,
        }
        let data: Data = self.execute(FIND_STUDIOS, json!({ "name": name })).await?;
        Ok(data
            .find
            .studios
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| StudioRecord { id: s.id, name: s.name }))
    }

    async fn create_studio(&self, studio: &NewStudio) -> Result<StudioRecord, CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "studioCreate")]
            studio: IdName,
        }
        let data: Data = self.execute(CREATE_STUDIO, json!({ "input": studio })).await?;
        info!(studio = %data.studio.name, id = %data.studio.id, "Created studio");
        Ok(StudioRecord {
            id: data.studio.id,
            name: data.studio.name,
        })
    }

    async fn find_performer(&self, name: &str) -> Result<Option<PerformerRecord>, CatalogError> {
        let by_name = self.performers_matching(FIND_PERFORMERS_BY_NAME, name).await?;
        if let Some(found) = by_name.into_iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
            return Ok(Some(found.into()));
        }

        let by_alias = self.performers_matching(FIND_PERFORMERS_BY_ALIAS, name).await?;
        Ok(by_alias
            .into_iter()
            .find(|p| p.alias_list.iter().any(|a| a.eq_ignore_ascii_case(name)))
            .map(PerformerRecord::from))
    }

    async fn create_performer(&self, performer: &NewPerformer) -> Result<PerformerRecord, CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "performerCreate")]
            performer: StashPerformer,
        }
        let data: Data = self
            .execute(CREATE_PERFORMER, json!({ "input": performer_input(performer) }))
            .await?;
        info!(performer = %data.performer.name, id = %data.performer.id, "Created performer");
        Ok(data.performer.into())
    }

    async fn update_performer_aliases(&self, id: &str, aliases: &[String]) -> Result<(), CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "performerUpdate")]
            _performer: Option<IdOnly>,
        }
        let _: Data = self
            .execute(UPDATE_PERFORMER, json!({ "id": id, "aliases": aliases }))
            .await?;
        Ok(())
    }

    async fn scrape_performer_enrichment(&self, name: &str) -> Result<Option<NewPerformer>, CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "scrapeSinglePerformer")]
            results: Vec<ScrapedPerformer>,
        }
        let data: Data = self
            .execute(SCRAPE_PERFORMER, json!({ "scraper": ENRICHMENT_SCRAPER, "name": name }))
            .await?;

        let mut results: Vec<NewPerformer> = data
            .results
            .into_iter()
            .map(ScrapedPerformer::into_new_performer)
            .collect();
        let exact = results.iter().position(|p| p.name.eq_ignore_ascii_case(name));
        Ok(match exact {
            Some(i) => Some(results.swap_remove(i)),
            None => results.into_iter().next(),
        })
    }

    async fn wait_for_idle(&self) -> Result<(), CatalogError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "jobQueue")]
            jobs: Option<Vec<IdOnly>>,
        }
        loop {
            let data: Data = self.execute(JOB_QUEUE, json!({})).await?;
            let pending = data.jobs.map_or(0, |jobs| jobs.len());
            if pending == 0 {
                return Ok(());
            }
            debug!(pending, "Waiting for catalog job queue to drain");
            tokio::time::sleep(self.idle_poll).await;
        }
    }
}
