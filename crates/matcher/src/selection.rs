use crate::config::SelectionThresholds;
use crate::result::MatchResult;
use crate::scoring::rank_order;
use serde::{Deserialize, Serialize};

/// Slack for float comparisons against thresholds.
const SCORE_EPSILON: f64 = 1e-9;

/// What to do with a ranked result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionOutcome {
    /// One procedure clears `accept` with no competitor inside `closeness`
    SingleMatch { selected: MatchResult },
    /// Two or more candidates within `closeness` of the top; the caller must choose
    Disambiguation {
        candidates: Vec<MatchResult>,
        question: String,
        suggested_default: String,
    },
    /// Candidates exist but none is decisive
    MultiOption {
        top: MatchResult,
        alternatives: Vec<MatchResult>,
    },
    /// Nothing clears `floor`
    NoMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        best_score: Option<f64>,
    },
}

impl SelectionOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SingleMatch { .. } => "single_match",
            Self::Disambiguation { .. } => "disambiguation",
            Self::MultiOption { .. } => "multi_option",
            Self::NoMatch { .. } => "no_match",
        }
    }

    /// The result a caller would act on by default.
    pub fn primary(&self) -> Option<&MatchResult> {
        match self {
            Self::SingleMatch { selected } => Some(selected),
            Self::Disambiguation { candidates, .. } => candidates.first(),
            Self::MultiOption { top, .. } => Some(top),
            Self::NoMatch { .. } => None,
        }
    }

    /// Every result carried by the outcome, best first.
    pub fn candidates(&self) -> Vec<&MatchResult> {
        match self {
            Self::SingleMatch { selected } => vec![selected],
            Self::Disambiguation { candidates, .. } => candidates.iter().collect(),
            Self::MultiOption { top, alternatives } => {
                std::iter::once(top).chain(alternatives).collect()
            }
            Self::NoMatch { .. } => Vec::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch { .. })
    }
}

/// Apply the selection thresholds to scored results.
///
/// `results` need not be ranked. Excluded results and results below `floor`
/// are never part of the outcome.
pub fn select(results: &[MatchResult], thresholds: &SelectionThresholds) -> SelectionOutcome {
    let mut candidates: Vec<&MatchResult> = results
        .iter()
        .filter(|r| !r.is_excluded() && r.score + SCORE_EPSILON >= thresholds.floor)
        .collect();
    candidates.sort_by(|a, b| rank_order(a, b));

    let Some(top) = candidates.first().copied() else {
        let best_score = results
            .iter()
            .filter(|r| !r.is_excluded())
            .map(|r| r.score)
            .max_by(f64::total_cmp);
        return SelectionOutcome::NoMatch { best_score };
    };

    let window = candidates
        .iter()
        .take_while(|c| top.score - c.score <= thresholds.closeness + SCORE_EPSILON)
        .count();

    if window == 1 && top.score + SCORE_EPSILON >= thresholds.accept {
        return SelectionOutcome::SingleMatch {
            selected: top.clone(),
        };
    }

    if window >= 2 {
        let competing: Vec<MatchResult> = candidates[..window]
            .iter()
            .map(|c| (*c).clone())
            .collect();
        return SelectionOutcome::Disambiguation {
            question: disambiguation_question(&competing),
            suggested_default: top.procedure_id.clone(),
            candidates: competing,
        };
    }

    SelectionOutcome::MultiOption {
        top: top.clone(),
        alternatives: candidates
            .iter()
            .skip(1)
            .take(thresholds.max_alternatives)
            .map(|c| (*c).clone())
            .collect(),
    }
}

/// Question put to the caller when several procedures compete.
pub fn disambiguation_question(candidates: &[MatchResult]) -> String {
    let mut question = String::from(
        "Several investigation procedures fit this query about equally well. \
         Which one best describes the situation?",
    );
    for (index, candidate) in candidates.iter().enumerate() {
        question.push_str(&format!(
            "\n{}. {} [{}] (confidence {}%)",
            index + 1,
            candidate.procedure_name,
            candidate.procedure_id,
            candidate.confidence_percent()
        ));
    }
    question
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ExclusionHit, ExclusionRule};
    use pretty_assertions::assert_eq;

    fn result(id: &str, score: f64) -> MatchResult {
        MatchResult {
            procedure_id: id.to_string(),
            procedure_name: format!("Procedure {id}"),
            score,
            breakdown: Default::default(),
            explanations: Vec::new(),
            excluded: None,
            highlights: Default::default(),
        }
    }

    fn ids(results: &[&MatchResult]) -> Vec<String> {
        results.iter().map(|r| r.procedure_id.clone()).collect()
    }

    #[test]
    fn clear_winner_is_a_single_match() {
        let outcome = select(
            &[result("a", 0.82), result("b", 0.40)],
            &SelectionThresholds::default(),
        );
        assert_eq!(outcome.kind(), "single_match");
        assert_eq!(outcome.primary().unwrap().procedure_id, "a");
    }

    #[test]
    fn close_scores_need_disambiguation() {
        let outcome = select(
            &[result("b", 0.55), result("a", 0.62), result("c", 0.20)],
            &SelectionThresholds::default(),
        );
        match &outcome {
            SelectionOutcome::Disambiguation {
                candidates,
                question,
                suggested_default,
            } => {
                assert_eq!(
                    ids(&candidates.iter().collect::<Vec<_>>()),
                    vec!["a", "b"]
                );
                assert_eq!(suggested_default, "a");
                assert!(question.contains("1. Procedure a [a] (confidence 62%)"), "{question}");
                assert!(question.contains("2. Procedure b [b] (confidence 55%)"), "{question}");
            }
            other => panic!("expected disambiguation, got {other:?}"),
        }
    }

    #[test]
    fn gap_exactly_at_closeness_still_competes() {
        let outcome = select(
            &[result("a", 0.65), result("b", 0.50)],
            &SelectionThresholds::default(),
        );
        assert_eq!(outcome.kind(), "disambiguation");
    }

    #[test]
    fn weak_lone_candidate_is_a_multi_option() {
        let outcome = select(
            &[result("a", 0.45), result("b", 0.10)],
            &SelectionThresholds::default(),
        );
        match outcome {
            SelectionOutcome::MultiOption { top, alternatives } => {
                assert_eq!(top.procedure_id, "a");
                assert!(alternatives.is_empty());
            }
            other => panic!("expected multi_option, got {other:?}"),
        }
    }

    #[test]
    fn multi_option_caps_alternatives() {
        let thresholds = SelectionThresholds {
            floor: 0.1,
            accept: 0.9,
            closeness: 0.05,
            max_alternatives: 2,
        };
        let results = [
            result("a", 0.80),
            result("b", 0.60),
            result("c", 0.40),
            result("d", 0.20),
        ];
        match select(&results, &thresholds) {
            SelectionOutcome::MultiOption { top, alternatives } => {
                assert_eq!(top.procedure_id, "a");
                assert_eq!(
                    ids(&alternatives.iter().collect::<Vec<_>>()),
                    vec!["b", "c"]
                );
            }
            other => panic!("expected multi_option, got {other:?}"),
        }
    }

    #[test]
    fn below_floor_is_no_match_with_best_score() {
        let outcome = select(
            &[result("a", 0.12), result("b", 0.25)],
            &SelectionThresholds::default(),
        );
        assert_eq!(outcome, SelectionOutcome::NoMatch { best_score: Some(0.25) });
        assert!(!outcome.is_match());
        assert!(outcome.candidates().is_empty());

        let empty = select(&[], &SelectionThresholds::default());
        assert_eq!(empty, SelectionOutcome::NoMatch { best_score: None });
    }

    #[test]
    fn excluded_results_are_never_selected() {
        let mut vetoed = result("a", 0.0);
        vetoed.excluded = Some(ExclusionHit {
            rule: ExclusionRule::ExcludedService,
            pattern: "kafka".into(),
            evidence: "service 'kafka'".into(),
        });
        let outcome = select(&[vetoed, result("b", 0.70)], &SelectionThresholds::default());
        assert_eq!(outcome.kind(), "single_match");
        assert_eq!(outcome.primary().unwrap().procedure_id, "b");
    }

    #[test]
    fn equal_scores_order_by_id() {
        let outcome = select(
            &[result("zeta", 0.7), result("alpha", 0.7)],
            &SelectionThresholds::default(),
        );
        assert_eq!(ids(&outcome.candidates()), vec!["alpha", "zeta"]);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(SelectionOutcome::NoMatch { best_score: None }).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "no_match"}));
    }
}
