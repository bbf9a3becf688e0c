//! Disambiguation policy
//!
//! A pure decision over the scored candidate list. Operator interaction is
//! not done here: when a human has to choose, the outcome says so and the
//! caller asks through an [`crate::services::operator::Operator`].
//!
//! Precedence, for two or more candidates:
//! 1. exact URL match
//! 2. same studio, same date, score above `studio_date`
//! 3. same studio, score above `studio` (the scene's date is kept)
//! 4. different studio, same date, score above `close_studio_date`
//!
//! Within a rule the highest score wins; equal scores go to the candidate
//! the provider returned first.

use crate::config::MatchThresholds;
use crate::services::candidate_scorer::{ScoredCandidate, StudioMatch};

/// How remaining ties are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Ask the operator to choose
    Manual,
    /// Accept the provider's first result
    Automatic,
    /// Leave the scene ambiguous
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisambiguationPolicy {
    pub thresholds: MatchThresholds,
    pub tie_break: TieBreak,
}

/// Which rule produced a match (for logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Url,
    StudioAndDate,
    Studio,
    CloseStudioAndDate,
    OnlyCandidate,
    AutoPick,
    OperatorChoice,
}

/// Outcome of the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No candidates
    Unmatched,
    /// Candidate at `index`; `adopt_scene_date` keeps the local date
    Matched {
        index: usize,
        reason: MatchReason,
        adopt_scene_date: bool,
    },
    /// Several candidates remain and the operator must pick
    NeedsOperator,
    /// Several candidates remain and nobody may pick
    Ambiguous,
}

fn best_where<F>(candidates: &[ScoredCandidate], predicate: F) -> Option<usize>
where
    F: Fn(&ScoredCandidate) -> bool,
{
    let mut best: Option<(usize, f64)> = None;
    for (index, c) in candidates.iter().enumerate() {
        if !predicate(c) {
            continue;
        }
        // Strictly greater keeps the earliest on ties
        if best.map_or(true, |(_, score)| c.score > score) {
            best = Some((index, c.score));
        }
    }
    best.map(|(index, _)| index)
}

/// Reduce the scored candidate list to a decision; deterministic
pub fn decide(candidates: &[ScoredCandidate], policy: &DisambiguationPolicy) -> Decision {
    let t = policy.thresholds;
    let matched = |index, reason, adopt_scene_date| Decision::Matched {
        index,
        reason,
        adopt_scene_date,
    };

    match candidates.len() {
        0 => return Decision::Unmatched,
        1 => return matched(0, MatchReason::OnlyCandidate, false),
        _ => {}
    }

    if let Some(i) = best_where(candidates, |c| c.url_match) {
        return matched(i, MatchReason::Url, false);
    }
    if let Some(i) = best_where(candidates, |c| {
        c.studio == StudioMatch::Same && c.date_match && c.score > t.studio_date
    }) {
        return matched(i, MatchReason::StudioAndDate, false);
    }
    if let Some(i) = best_where(candidates, |c| c.studio == StudioMatch::Same && c.score > t.studio) {
        return matched(i, MatchReason::Studio, true);
    }
    if let Some(i) = best_where(candidates, |c| {
        c.studio == StudioMatch::Different && c.date_match && c.score > t.close_studio_date
    }) {
        return matched(i, MatchReason::CloseStudioAndDate, false);
    }

    match policy.tie_break {
        TieBreak::Manual => Decision::NeedsOperator,
        TieBreak::Automatic => matched(0, MatchReason::AutoPick, false),
        TieBreak::None => Decision::Ambiguous,
    }
}

/// One line per candidate for the operator prompt
pub fn describe_candidate(candidate: &ScoredCandidate) -> String {
    let c = &candidate.candidate;
    let mut parts = Vec::new();
    if let Some(studio) = c.studio_name() {
        parts.push(studio.to_string());
    }
    if let Some(date) = c.date {
        parts.push(date.format("%Y-%m-%d").to_string());
    }
    parts.push(c.title.clone());
    if let Some(clip) = &c.clip_id {
        parts.push(format!("[{}]", clip));
    }
    let names = c.female_performer_names();
    if !names.is_empty() {
        parts.push(format!("({})", names.join(", ")));
    }
    format!("{} - score {:.2}", parts.join(" "), candidate.score)
}
