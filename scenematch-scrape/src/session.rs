//! Per-run mutable matching state
//!
//! One `MatchSession` is built per run and threaded through every scene.
//! It owns the operator-confirmed alias map and the per-provider
//! consecutive-error counters. Both only grow or reset within the run.

use crate::error::ScrapeError;
use std::collections::{BTreeSet, HashMap};
use tracing::{error, info, warn};

#[derive(Debug, Default)]
pub struct MatchSession {
    /// canonical performer name -> confirmed alias strings
    known_aliases: HashMap<String, BTreeSet<String>>,
    consecutive_errors: HashMap<String, u32>,
    max_consecutive_errors: u32,
}

impl MatchSession {
    pub fn new(max_consecutive_errors: u32) -> Self {
        Self {
            known_aliases: HashMap::new(),
            consecutive_errors: HashMap::new(),
            max_consecutive_errors,
        }
    }

    /// Record a confirmed alias; entries are never removed during a run
    pub fn register_alias(&mut self, canonical: &str, alias: &str) {
        let inserted = self
            .known_aliases
            .entry(canonical.to_string())
            .or_default()
            .insert(alias.to_string());
        if inserted {
            info!(canonical = %canonical, alias = %alias, "Registered performer alias for this run");
        }
    }

    /// Confirmed aliases for a canonical name
    pub fn aliases_of(&self, canonical: &str) -> impl Iterator<Item = &str> {
        self.known_aliases
            .get(canonical)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn is_known_alias(&self, canonical: &str, alias: &str) -> bool {
        self.known_aliases
            .get(canonical)
            .is_some_and(|set| set.contains(alias))
    }

    pub fn consecutive_errors(&self, provider: &str) -> u32 {
        self.consecutive_errors.get(provider).copied().unwrap_or(0)
    }

    /// A provider call succeeded: its counter resets
    pub fn record_success(&mut self, provider: &str) {
        if let Some(count) = self.consecutive_errors.get_mut(provider) {
            *count = 0;
        }
    }

    /// A provider call failed. Exceeding the limit is a fatal outage.
    pub fn record_failure(&mut self, provider: &str) -> Result<u32, ScrapeError> {
        let count = self.consecutive_errors.entry(provider.to_string()).or_insert(0);
        *count += 1;
        let failures = *count;

        if failures > self.max_consecutive_errors {
            error!(provider = %provider, failures, "Provider seems to be down, stopping run");
            return Err(ScrapeError::ProviderOutage {
                provider: provider.to_string(),
                failures,
            });
        }

        warn!(
            provider = %provider,
            failures,
            limit = self.max_consecutive_errors,
            "Provider request failed"
        );
        Ok(failures)
    }
}
