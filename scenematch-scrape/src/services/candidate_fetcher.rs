//! Remote candidate fetching with outage detection
//!
//! Wraps a [`ProviderAdapter`] so every call updates the session's
//! consecutive-error counter. A failed call yields `Ok(None)` ("no
//! candidates, transport failure"); an empty hit list yields
//! `Ok(Some(vec![]))`. Crossing the error limit returns the fatal
//! [`ScrapeError::ProviderOutage`].

use crate::error::{ProviderError, ScrapeResult};
use crate::providers::ProviderAdapter;
use crate::session::MatchSession;
use crate::types::{Candidate, ParentRef, PerformerProfile, RemoteStudio, SearchHits, SearchKind};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct CandidateFetcher {
    adapter: Arc<dyn ProviderAdapter>,
}

impl CandidateFetcher {
    pub fn new(adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &dyn ProviderAdapter {
        self.adapter.as_ref()
    }

    pub fn provider_name(&self) -> &str {
        self.adapter.name()
    }

    fn track<T>(&self, session: &mut MatchSession, result: Result<T, ProviderError>) -> ScrapeResult<Option<T>> {
        match result {
            Ok(value) => {
                session.record_success(self.adapter.name());
                Ok(Some(value))
            }
            Err(e) => {
                tracing::error!(provider = %self.adapter.name(), error = %e, "Error communicating with provider");
                session.record_failure(self.adapter.name())?;
                Ok(None)
            }
        }
    }

    /// Raw search of any kind
    pub async fn search(&self, session: &mut MatchSession, kind: &SearchKind) -> ScrapeResult<Option<SearchHits>> {
        let result = self.adapter.search(kind).await;
        if let Ok(hits) = &result {
            debug!(provider = %self.adapter.name(), ?kind, hits = hits.len(), "Provider search finished");
        }
        self.track(session, result)
    }

    /// Scene search; `None` means the request failed
    pub async fn search_scenes(
        &self,
        session: &mut MatchSession,
        kind: &SearchKind,
    ) -> ScrapeResult<Option<Vec<Candidate>>> {
        Ok(self.search(session, kind).await?.map(SearchHits::into_scenes))
    }

    /// Free-text scene search trying each of the adapter's text modes until
    /// one returns candidates. `None` only when every attempt failed.
    pub async fn search_text(&self, session: &mut MatchSession, query: &str) -> ScrapeResult<Option<Vec<Candidate>>> {
        let mut outcome = None;
        for &mode in self.adapter.text_modes() {
            let kind = SearchKind::Text {
                query: query.to_string(),
                mode,
            };
            match self.search_scenes(session, &kind).await? {
                Some(found) if !found.is_empty() => return Ok(Some(found)),
                Some(empty) => outcome = Some(empty),
                None => {}
            }
        }
        Ok(outcome)
    }

    pub async fn scene_details(
        &self,
        session: &mut MatchSession,
        candidate: &Candidate,
    ) -> ScrapeResult<Option<Candidate>> {
        let result = self.adapter.scene_details(candidate).await;
        Ok(self.track(session, result)?.flatten())
    }

    /// Provider's own profile for a performer name (alias graph, portrait)
    pub async fn performer_by_name(
        &self,
        session: &mut MatchSession,
        name: &str,
    ) -> ScrapeResult<Option<PerformerProfile>> {
        let kind = SearchKind::PerformerName(name.to_string());
        let hits = self.search(session, &kind).await?;
        Ok(hits.and_then(|h| h.into_performers().into_iter().next()))
    }

    /// Resolve a parent reference to a studio record
    pub async fn studio_by_ref(
        &self,
        session: &mut MatchSession,
        parent: &ParentRef,
    ) -> ScrapeResult<Option<RemoteStudio>> {
        let (slug, is_network) = match parent {
            ParentRef::Parent(slug) => (slug, false),
            ParentRef::Network(slug) => (slug, true),
        };
        let kind = SearchKind::StudioSlug(slug.clone());
        let hits = self.search(session, &kind).await?;
        Ok(hits
            .and_then(|h| h.into_studios().into_iter().next())
            .map(|mut studio| {
                studio.is_network |= is_network;
                studio
            }))
    }
}
