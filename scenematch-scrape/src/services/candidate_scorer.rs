//! Candidate filtering and similarity scoring
//!
//! The score is the best of several independent string comparisons, so
//! one strong signal (an exact title, a performer-led filename, a clip id)
//! is enough to rank a candidate highly.

use crate::services::normalizer::normalize_for_compare;
use crate::services::query_builder::Query;
use crate::types::{Candidate, LocalScene};
use chrono::NaiveDate;

/// The local side of every comparison
#[derive(Debug, Clone, PartialEq)]
pub struct SceneContext {
    /// Scene title, or the working title derived while building the query
    pub title: String,
    pub query: String,
    pub studio: Option<String>,
    pub date: Option<NaiveDate>,
    pub url: Option<String>,
}

impl SceneContext {
    pub fn new(scene: &LocalScene, query: &Query) -> Self {
        let title = scene
            .title()
            .map(str::to_string)
            .or_else(|| query.hints.title.clone())
            .unwrap_or_default();
        Self {
            title,
            query: query.text.clone(),
            studio: scene.studio_name().map(str::to_string),
            date: scene.date.or(query.hints.date),
            url: scene.url.clone().filter(|u| !u.trim().is_empty()),
        }
    }
}

/// How a candidate's studio relates to the scene's studio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudioMatch {
    /// Same studio (or its parent, or a studio of the same family)
    Same,
    /// Both known, not the same
    Different,
    /// One side has no studio
    Unknown,
}

/// A candidate with everything the disambiguation policy looks at
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
    pub studio: StudioMatch,
    pub date_match: bool,
    pub url_match: bool,
}

fn same_family(a: &str, b: &str, families: &[&[&str]]) -> bool {
    families
        .iter()
        .any(|family| family.contains(&a) && family.contains(&b))
}

/// Compare a candidate's studio (and its inlined parent) against the scene
pub fn studio_relation(scene_studio: Option<&str>, candidate: &Candidate, families: &[&[&str]]) -> StudioMatch {
    let (Some(local), Some(remote)) = (scene_studio, candidate.studio.as_ref()) else {
        return StudioMatch::Unknown;
    };
    let local = normalize_for_compare(local);
    let names = std::iter::once(remote.name.as_str()).chain(remote.parent_name());

    for name in names {
        let key = normalize_for_compare(name);
        if key == local || same_family(&key, &local, families) {
            return StudioMatch::Same;
        }
    }
    StudioMatch::Different
}

/// Drop candidates outside the scene's studio family.
///
/// Pass-through when the scene has no studio. The result preserves order
/// and is always a subset of the input.
pub fn filter_by_studio_family(
    scene_studio: Option<&str>,
    candidates: Vec<Candidate>,
    families: &[&[&str]],
) -> Vec<Candidate> {
    if scene_studio.map_or(true, |s| s.trim().is_empty()) {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| studio_relation(scene_studio, c, families) == StudioMatch::Same)
        .collect()
}

fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_for_compare(a), &normalize_for_compare(b))
}

/// Similarity in [0, 1] between the scene and one candidate
pub fn score(scene: &SceneContext, candidate: &Candidate) -> f64 {
    if let Some(clip) = candidate.clip_id.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        if scene.title.contains(clip) {
            return 1.0;
        }
    }

    let mut best = similarity(&candidate.title, &scene.title);

    let names = candidate.female_performer_names().join(" ");
    if !names.is_empty() {
        best = best.max(similarity(&format!("{} {}", names, candidate.title), &scene.title));
        best = best.max(similarity(&names, &scene.title));
    }

    if !normalize_for_compare(&scene.query).is_empty() {
        let date = candidate.date.map(|d| d.format("%Y-%m-%d").to_string());
        let descriptor = [candidate.studio_name(), date.as_deref(), Some(candidate.title.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        best = best.max(similarity(&descriptor, &scene.query));
    }

    best.clamp(0.0, 1.0)
}

/// An undated scene matches any candidate date, including none
pub fn date_matches(scene: Option<NaiveDate>, candidate: Option<NaiveDate>) -> bool {
    match scene {
        Some(date) => candidate == Some(date),
        None => true,
    }
}

/// Score every candidate and record the policy signals, keeping order
pub fn score_candidates(
    scene: &SceneContext,
    candidates: Vec<Candidate>,
    families: &[&[&str]],
) -> Vec<ScoredCandidate> {
    candidates
        .into_iter()
        .map(|candidate| {
            let score = score(scene, &candidate);
            let studio = studio_relation(scene.studio.as_deref(), &candidate, families);
            let date_match = date_matches(scene.date, candidate.date);
            let url_match = matches!(
                (scene.url.as_deref(), candidate.url.as_deref()),
                (Some(a), Some(b)) if a.trim_end_matches('/') == b.trim_end_matches('/')
            );
            ScoredCandidate {
                candidate,
                score,
                studio,
                date_match,
                url_match,
            }
        })
        .collect()
}
