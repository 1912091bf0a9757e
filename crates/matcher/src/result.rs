use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Keyword,
    Service,
    Metric,
    Log,
    Booster,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::Keyword,
        Factor::Service,
        Factor::Metric,
        Factor::Log,
        Factor::Booster,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Factor::Keyword => "keyword",
            Factor::Service => "service",
            Factor::Metric => "metric",
            Factor::Log => "log",
            Factor::Booster => "booster",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One factor's part in a procedure's score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FactorScore {
    /// False when the procedure declares nothing for this factor; it then
    /// counts in neither numerator nor denominator.
    pub applicable: bool,
    /// Factor value in `[0, 1]`
    pub value: f64,
    pub weight: f64,
    /// Share of the final score, after normalisation
    pub contribution: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub keyword: FactorScore,
    pub service: FactorScore,
    pub metric: FactorScore,
    pub log: FactorScore,
    pub booster: FactorScore,
}

impl ScoreBreakdown {
    pub fn get(&self, factor: Factor) -> &FactorScore {
        match factor {
            Factor::Keyword => &self.keyword,
            Factor::Service => &self.service,
            Factor::Metric => &self.metric,
            Factor::Log => &self.log,
            Factor::Booster => &self.booster,
        }
    }

    pub(crate) fn get_mut(&mut self, factor: Factor) -> &mut FactorScore {
        match factor {
            Factor::Keyword => &mut self.keyword,
            Factor::Service => &mut self.service,
            Factor::Metric => &mut self.metric,
            Factor::Log => &mut self.log,
            Factor::Booster => &mut self.booster,
        }
    }

    /// Total weight of the applicable factors.
    pub fn applicable_weight(&self) -> f64 {
        Factor::ALL
            .iter()
            .map(|f| self.get(*f))
            .filter(|s| s.applicable)
            .map(|s| s.weight)
            .sum()
    }
}

/// A procedure pattern that fired, and the bundle signal it fired on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub factor: Factor,
    pub pattern: String,
    pub evidence: String,
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: '{}' matched {}", self.factor, self.pattern, self.evidence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRule {
    ExcludedService,
    ExcludedCondition,
    ConflictingSymptom,
}

/// The veto that removed a procedure from consideration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionHit {
    pub rule: ExclusionRule,
    pub pattern: String,
    pub evidence: String,
}

impl fmt::Display for ExclusionHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = match self.rule {
            ExclusionRule::ExcludedService => "excluded service",
            ExclusionRule::ExcludedCondition => "excluded condition",
            ExclusionRule::ConflictingSymptom => "conflicting symptom",
        };
        write!(f, "{rule} '{}' present in {}", self.pattern, self.evidence)
    }
}

/// Bundle signals relevant to one procedure, for showing the caller why it fits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextHighlights {
    pub services: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
    pub logs: Vec<String>,
    pub symptoms: Vec<String>,
}

impl ContextHighlights {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.metrics.is_empty()
            && self.logs.is_empty()
            && self.symptoms.is_empty()
    }
}

/// Score and explanation for one procedure against one bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub procedure_id: String,
    pub procedure_name: String,
    /// In `[0, 1]`; exactly 0 when excluded
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub explanations: Vec<Explanation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded: Option<ExclusionHit>,
    pub highlights: ContextHighlights,
}

impl MatchResult {
    pub fn is_excluded(&self) -> bool {
        self.excluded.is_some()
    }

    pub fn explanations_for(&self, factor: Factor) -> impl Iterator<Item = &Explanation> {
        self.explanations.iter().filter(move |e| e.factor == factor)
    }

    /// Confidence as a whole percentage, for display.
    pub fn confidence_percent(&self) -> u32 {
        // Score is clamped to [0, 1], so the cast cannot truncate.
        (self.score.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}
