use crate::config::{MatchWeights, SelectionThresholds};
use crate::error::Result;
use crate::result::MatchResult;
use crate::scoring::find_matches;
use crate::selection::{select, SelectionOutcome};
use sop_catalog::Procedure;
use sop_gather::SignalBundle;

/// Validated weights and thresholds, applied together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matcher {
    weights: MatchWeights,
    thresholds: SelectionThresholds,
}

/// Ranked results and the outcome selected from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub results: Vec<MatchResult>,
    pub outcome: SelectionOutcome,
}

impl Matcher {
    pub fn new(weights: MatchWeights, thresholds: SelectionThresholds) -> Result<Self> {
        weights.validate()?;
        thresholds.validate()?;
        Ok(Self {
            weights,
            thresholds,
        })
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    pub fn thresholds(&self) -> &SelectionThresholds {
        &self.thresholds
    }

    pub fn find_matches(&self, bundle: &SignalBundle, procedures: &[Procedure]) -> Vec<MatchResult> {
        find_matches(bundle, procedures, &self.weights)
    }

    pub fn select(&self, results: &[MatchResult]) -> SelectionOutcome {
        select(results, &self.thresholds)
    }

    /// Score, rank and select in one pass.
    pub fn evaluate(&self, bundle: &SignalBundle, procedures: &[Procedure]) -> Evaluation {
        let results = self.find_matches(bundle, procedures);
        let outcome = self.select(&results);
        let excluded = results.iter().filter(|r| r.is_excluded()).count();
        log::debug!(
            "Scored {} procedure(s), {excluded} excluded; outcome {}",
            results.len(),
            outcome.kind()
        );
        Evaluation { results, outcome }
    }
}
