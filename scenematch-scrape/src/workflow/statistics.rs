//! Run statistics

use super::pipeline::SceneOutcome;

/// Counts per terminal outcome
///
/// Display: "N matched, N ambiguous, N unmatched, ..."
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Scenes the pipeline was run on
    pub considered: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    pub parse_failures: usize,
    pub provider_failures: usize,
    /// Catalog writes that failed, or catalog errors while merging
    pub update_failures: usize,
}

impl RunStatistics {
    pub fn record(&mut self, outcome: SceneOutcome) {
        self.considered += 1;
        let slot = match outcome {
            SceneOutcome::Matched => &mut self.matched,
            SceneOutcome::Ambiguous => &mut self.ambiguous,
            SceneOutcome::Unmatched => &mut self.unmatched,
            SceneOutcome::ParseFailure => &mut self.parse_failures,
            SceneOutcome::ProviderFailure => &mut self.provider_failures,
            SceneOutcome::UpdateFailure => &mut self.update_failures,
        };
        *slot += 1;
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} matched, {} ambiguous, {} unmatched, {} unparseable, {} provider failures, {} update failures",
            self.matched,
            self.ambiguous,
            self.unmatched,
            self.parse_failures,
            self.provider_failures,
            self.update_failures
        )
    }
}
