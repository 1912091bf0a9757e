use crate::error::{MatchError, Result};
use crate::result::Factor;
use serde::{Deserialize, Serialize};

/// Relative importance of the five scoring factors.
///
/// Weights need not sum to 1: each procedure's score is divided by the total
/// weight of the factors that apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchWeights {
    pub keyword: f64,
    pub service: f64,
    pub metric: f64,
    pub log: f64,
    pub booster: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            keyword: 0.20,
            service: 0.30,
            metric: 0.25,
            log: 0.15,
            booster: 0.10,
        }
    }
}

impl MatchWeights {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Keyword => self.keyword,
            Factor::Service => self.service,
            Factor::Metric => self.metric,
            Factor::Log => self.log,
            Factor::Booster => self.booster,
        }
    }

    pub fn total(&self) -> f64 {
        self.keyword + self.service + self.metric + self.log + self.booster
    }

    pub fn validate(&self) -> Result<()> {
        for factor in Factor::ALL {
            let value = self.get(factor);
            if !value.is_finite() || value < 0.0 {
                return Err(MatchError::InvalidConfig(format!(
                    "weights.{factor} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "at least one weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub const DEFAULT_FLOOR: f64 = 0.30;
pub const DEFAULT_ACCEPT: f64 = 0.50;
pub const DEFAULT_CLOSENESS: f64 = 0.15;
pub const DEFAULT_MAX_ALTERNATIVES: usize = 3;

/// Cut-offs that turn a ranked result list into a [`crate::SelectionOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionThresholds {
    /// Minimum score to be a candidate at all
    pub floor: f64,

    /// Minimum score for a single match with no close competitor
    pub accept: f64,

    /// Score gap below the top inside which candidates compete
    pub closeness: f64,

    /// Alternatives listed next to the top candidate in a multi-option outcome
    pub max_alternatives: usize,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        Self {
            floor: DEFAULT_FLOOR,
            accept: DEFAULT_ACCEPT,
            closeness: DEFAULT_CLOSENESS,
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
        }
    }
}

impl SelectionThresholds {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("floor", self.floor),
            ("accept", self.accept),
            ("closeness", self.closeness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MatchError::InvalidConfig(format!(
                    "thresholds.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.accept < self.floor {
            return Err(MatchError::InvalidConfig(format!(
                "thresholds.accept ({}) must not be below thresholds.floor ({})",
                self.accept, self.floor
            )));
        }
        Ok(())
    }
}
