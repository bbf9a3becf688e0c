//! Test Helper Utilities
//!
//! In-memory catalog, scripted provider and scripted operator for driving
//! the matching workflow without a network or a terminal.

#![allow(dead_code)]

use async_trait::async_trait;
use scenematch_scrape::catalog::{
    CatalogClient, NewPerformer, NewStudio, PerformerRecord, SceneFilter, StudioRecord, TagRecord,
};
use scenematch_scrape::error::{CatalogError, ProviderError};
use scenematch_scrape::providers::ProviderAdapter;
use scenematch_scrape::services::operator::{AliasAnswer, Operator};
use scenematch_scrape::types::{
    Candidate, CatalogId, Gender, LocalScene, PerformerProfile, PerformerStub, RemoteStudio, SceneUpdate,
    SearchHits, SearchKind, StudioLink,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const PROVIDER_NAME: &str = "Scripted";

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CatalogState {
    pub scenes: Vec<LocalScene>,
    pub tags: Vec<TagRecord>,
    pub studios: Vec<StudioRecord>,
    pub performers: Vec<PerformerRecord>,
    pub created_performers: Vec<NewPerformer>,
    pub commits: Vec<SceneUpdate>,
    /// Commits still to be rejected before writes succeed again
    pub rejected_commits: u32,
    next_id: u32,
}

impl CatalogState {
    fn next_id(&mut self) -> CatalogId {
        self.next_id += 1;
        format!("c{}", self.next_id)
    }
}

/// Catalog kept in memory; commits are applied to the stored scenes
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    pub state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&self, name: &str) -> CatalogId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.tags.push(TagRecord {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    pub fn add_studio(&self, name: &str) -> StudioLink {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.studios.push(StudioRecord {
            id: id.clone(),
            name: name.to_string(),
        });
        StudioLink {
            id,
            name: name.to_string(),
        }
    }

    pub fn add_performer(&self, name: &str, aliases: &[&str]) -> CatalogId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.performers.push(PerformerRecord {
            id: id.clone(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        });
        id
    }

    pub fn add_scene(&self, mut scene: LocalScene) -> CatalogId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        scene.id = Some(id.clone());
        state.scenes.push(scene);
        id
    }

    pub fn scene(&self, id: &str) -> LocalScene {
        let state = self.state.lock().unwrap();
        state
            .scenes
            .iter()
            .find(|s| s.id.as_deref() == Some(id))
            .cloned()
            .expect("scene should exist")
    }

    pub fn tag_id(&self, name: &str) -> Option<CatalogId> {
        let state = self.state.lock().unwrap();
        state.tags.iter().find(|t| t.name == name).map(|t| t.id.clone())
    }

    pub fn performer_named(&self, name: &str) -> Option<PerformerRecord> {
        let state = self.state.lock().unwrap();
        state.performers.iter().find(|p| p.name == name).cloned()
    }

    /// Reject the next `count` scene commits
    pub fn reject_commits(&self, count: u32) {
        self.state.lock().unwrap().rejected_commits = count;
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits.len()
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn find_scenes(&self, filter: &SceneFilter) -> Result<Vec<LocalScene>, CatalogError> {
        let state = self.state.lock().unwrap();
        let mut scenes: Vec<LocalScene> = state
            .scenes
            .iter()
            .filter(|s| filter.required_tag_ids.iter().all(|t| s.tag_ids.contains(t)))
            .filter(|s| !filter.excluded_tag_ids.iter().any(|t| s.tag_ids.contains(t)))
            .filter(|s| {
                filter
                    .path_includes
                    .as_deref()
                    .map_or(true, |p| s.path.contains(p))
            })
            .cloned()
            .collect();
        if let Some(max) = filter.max_scenes {
            scenes.truncate(max);
        }
        Ok(scenes)
    }

    async fn commit_scene(&self, update: &SceneUpdate) -> Result<CatalogId, CatalogError> {
        let mut state = self.state.lock().unwrap();
        if state.rejected_commits > 0 {
            state.rejected_commits -= 1;
            return Err(CatalogError::GraphQl(vec!["scene update rejected".to_string()]));
        }
        state.commits.push(update.clone());

        let id = match &update.id {
            Some(id) => id.clone(),
            None => {
                let id = state.next_id();
                state.scenes.push(LocalScene {
                    id: Some(id.clone()),
                    ..Default::default()
                });
                id
            }
        };
        let studio = update.studio_id.as_ref().and_then(|sid| {
            state
                .studios
                .iter()
                .find(|s| &s.id == sid)
                .map(|s| StudioLink {
                    id: s.id.clone(),
                    name: s.name.clone(),
                })
        });
        let scene = state
            .scenes
            .iter_mut()
            .find(|s| s.id.as_deref() == Some(id.as_str()))
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        scene.title = update.title.clone();
        scene.details = update.details.clone();
        scene.date = update.date;
        scene.url = update.url.clone();
        scene.studio = studio;
        scene.tag_ids = update.tag_ids.clone();
        scene.performer_ids = update.performer_ids.clone();
        Ok(id)
    }

    async fn find_tag(&self, name: &str) -> Result<Option<TagRecord>, CatalogError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn create_tag(&self, name: &str) -> Result<TagRecord, CatalogError> {
        let id = self.add_tag(name);
        Ok(TagRecord {
            id,
            name: name.to_string(),
        })
    }

    async fn find_studio(&self, name: &str) -> Result<Option<StudioRecord>, CatalogError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .studios
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn create_studio(&self, studio: &NewStudio) -> Result<StudioRecord, CatalogError> {
        let link = self.add_studio(&studio.name);
        Ok(StudioRecord {
            id: link.id,
            name: link.name,
        })
    }

    async fn find_performer(&self, name: &str) -> Result<Option<PerformerRecord>, CatalogError> {
        let state = self.state.lock().unwrap();
        let by_name = state.performers.iter().find(|p| p.name == name);
        let by_alias = || state.performers.iter().find(|p| p.aliases.iter().any(|a| a == name));
        Ok(by_name.or_else(by_alias).cloned())
    }

    async fn create_performer(&self, performer: &NewPerformer) -> Result<PerformerRecord, CatalogError> {
        let aliases: Vec<&str> = performer.aliases.iter().map(String::as_str).collect();
        let id = self.add_performer(&performer.name, &aliases);
        self.state.lock().unwrap().created_performers.push(performer.clone());
        Ok(PerformerRecord {
            id,
            name: performer.name.clone(),
            aliases: performer.aliases.clone(),
        })
    }

    async fn update_performer_aliases(&self, id: &str, aliases: &[String]) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        let performer = state
            .performers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        performer.aliases = aliases.to_vec();
        Ok(())
    }

    async fn scrape_performer_enrichment(&self, _name: &str) -> Result<Option<NewPerformer>, CatalogError> {
        Ok(None)
    }

    async fn wait_for_idle(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Provider answering text searches from a queue.
///
/// An exhausted queue answers with no hits; `failing()` errors on every
/// request.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scene_results: Mutex<VecDeque<Result<Vec<Candidate>, ProviderError>>>,
    performers: HashMap<String, PerformerProfile>,
    always_fail: bool,
    pub calls: Mutex<Vec<SearchKind>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Default::default()
        }
    }

    pub fn with_scenes(self, candidates: Vec<Candidate>) -> Self {
        self.scene_results.lock().unwrap().push_back(Ok(candidates));
        self
    }

    pub fn with_performer(mut self, profile: PerformerProfile) -> Self {
        self.performers.insert(profile.name.clone(), profile);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search(&self, kind: &SearchKind) -> Result<SearchHits, ProviderError> {
        self.calls.lock().unwrap().push(kind.clone());
        if self.always_fail {
            return Err(ProviderError::Timeout("scripted outage".to_string()));
        }
        match kind {
            SearchKind::Text { .. } => match self.scene_results.lock().unwrap().pop_front() {
                Some(result) => result.map(SearchHits::Scenes),
                None => Ok(kind.empty_hits()),
            },
            SearchKind::PerformerName(name) => Ok(SearchHits::Performers(
                self.performers.get(name).cloned().into_iter().collect(),
            )),
            _ => Ok(kind.empty_hits()),
        }
    }
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// Operator answering from fixed scripts and recording every prompt
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    pub choices: VecDeque<Option<usize>>,
    pub alias_answers: VecDeque<AliasAnswer>,
    pub candidate_prompts: Vec<Vec<String>>,
    pub alias_prompts: Vec<(String, String)>,
}

impl Operator for ScriptedOperator {
    fn choose_candidate(&mut self, _scene_label: &str, options: &[String]) -> Option<usize> {
        self.candidate_prompts.push(options.to_vec());
        self.choices.pop_front().flatten()
    }

    fn confirm_alias(&mut self, remote_name: &str, canonical_name: &str, _site: &str) -> AliasAnswer {
        self.alias_prompts
            .push((remote_name.to_string(), canonical_name.to_string()));
        self.alias_answers.pop_front().unwrap_or(AliasAnswer::No)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn candidate(title: &str, studio: Option<&str>, date: Option<chrono::NaiveDate>) -> Candidate {
    Candidate {
        remote_id: Some(format!("r-{}", title.len())),
        title: title.to_string(),
        date,
        studio: studio.map(RemoteStudio::named),
        ..Default::default()
    }
}

pub fn female(name: &str) -> PerformerStub {
    PerformerStub::new(name, Some(Gender::Female))
}

pub fn scene_at(path: &str) -> LocalScene {
    LocalScene {
        path: path.to_string(),
        ..Default::default()
    }
}
