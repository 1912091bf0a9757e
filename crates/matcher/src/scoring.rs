use crate::config::MatchWeights;
use crate::result::{
    ContextHighlights, ExclusionHit, ExclusionRule, Explanation, Factor, MatchResult,
    ScoreBreakdown,
};
use globset::{GlobBuilder, GlobMatcher};
use sop_catalog::Procedure;
use sop_gather::SignalBundle;
use std::cmp::Ordering;

/// Score every procedure against `bundle` and rank the results.
///
/// Ranking is by score, highest first, then by procedure id, so equal inputs
/// always produce the same order. Excluded procedures stay in the list with a
/// score of 0 and the veto that removed them.
pub fn find_matches(
    bundle: &SignalBundle,
    procedures: &[Procedure],
    weights: &MatchWeights,
) -> Vec<MatchResult> {
    let signals = Signals::new(bundle);
    let mut results: Vec<MatchResult> = procedures
        .iter()
        .map(|procedure| evaluate(procedure, &signals, weights))
        .collect();
    rank(&mut results);
    results
}

/// Score a single procedure.
pub fn score_procedure(
    procedure: &Procedure,
    bundle: &SignalBundle,
    weights: &MatchWeights,
) -> MatchResult {
    evaluate(procedure, &Signals::new(bundle), weights)
}

pub fn rank(results: &mut [MatchResult]) {
    results.sort_by(rank_order);
}

pub(crate) fn rank_order(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.procedure_id.cmp(&b.procedure_id))
}

/// Lowercased view of a bundle, built once per scoring pass.
struct Signals<'a> {
    query: String,
    services: Vec<String>,
    affected: Vec<String>,
    symptoms: Vec<String>,
    metrics: Vec<(String, &'a str, f64)>,
    logs: Vec<(String, &'a str)>,
    alerts: Vec<(String, &'a str)>,
}

impl<'a> Signals<'a> {
    fn new(bundle: &'a SignalBundle) -> Self {
        Self {
            query: bundle.normalized_query.to_lowercase(),
            services: bundle
                .all_services()
                .into_iter()
                .map(str::to_lowercase)
                .collect(),
            affected: bundle
                .affected_services
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            symptoms: bundle
                .symptom_keywords
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            metrics: bundle
                .metrics
                .iter()
                .map(|(key, value)| (key.to_lowercase(), key.as_str(), *value))
                .collect(),
            logs: lowered(&bundle.log_patterns),
            alerts: lowered(&bundle.active_alerts),
        }
    }
}

fn lowered(items: &[String]) -> Vec<(String, &str)> {
    items
        .iter()
        .map(|item| (item.to_lowercase(), item.as_str()))
        .collect()
}

/// How far a service filter reaches a service name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Overlap {
    None,
    /// Shares a `-`, `_` or `.` separated segment
    Partial,
    /// Equal, or the filter is a prefix of the service
    Full,
}

fn overlap(filter: &str, service: &str) -> Overlap {
    if filter.is_empty() || service.is_empty() {
        return Overlap::None;
    }
    if service.starts_with(filter) {
        return Overlap::Full;
    }
    let shared = segments(service).any(|s| segments(filter).any(|f| f == s));
    if shared {
        Overlap::Partial
    } else {
        Overlap::None
    }
}

fn segments(name: &str) -> impl Iterator<Item = &str> {
    name.split(['-', '_', '.']).filter(|s| !s.is_empty())
}

fn normalized(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Metric pattern: a substring, or a glob when it contains glob syntax.
enum MetricPattern {
    Contains(String),
    Glob(GlobMatcher),
}

impl MetricPattern {
    fn new(pattern: &str) -> Self {
        if pattern.contains(['*', '?', '[']) {
            match GlobBuilder::new(pattern).case_insensitive(true).build() {
                Ok(glob) => return Self::Glob(glob.compile_matcher()),
                Err(err) => {
                    log::debug!("Metric pattern '{pattern}' is not a valid glob ({err}); matching literally")
                }
            }
        }
        Self::Contains(pattern.to_string())
    }

    /// Globs must cover the whole `<service>.<metric>` key or the metric part.
    fn matches(&self, key: &str) -> bool {
        match self {
            Self::Contains(needle) => key.contains(needle.as_str()),
            Self::Glob(glob) => {
                let metric = key.rsplit_once('.').map_or(key, |(_, m)| m);
                glob.is_match(key) || glob.is_match(metric)
            }
        }
    }
}

fn evaluate(procedure: &Procedure, signals: &Signals<'_>, weights: &MatchWeights) -> MatchResult {
    let mut result = MatchResult {
        procedure_id: procedure.id.clone(),
        procedure_name: procedure.name.clone(),
        score: 0.0,
        breakdown: ScoreBreakdown::default(),
        explanations: Vec::new(),
        excluded: None,
        highlights: ContextHighlights::default(),
    };
    for factor in Factor::ALL {
        result.breakdown.get_mut(factor).weight = weights.get(factor);
    }

    if let Some(hit) = find_exclusion(procedure, signals) {
        log::debug!("Procedure {} excluded: {hit}", procedure.id);
        result.excluded = Some(hit);
        return result;
    }

    let explanations = &mut result.explanations;
    let factors = [
        (Factor::Keyword, keyword_factor(procedure, signals, explanations)),
        (Factor::Service, service_factor(procedure, signals, explanations)),
        (Factor::Metric, metric_factor(procedure, signals, explanations)),
        (Factor::Log, log_factor(procedure, signals, explanations)),
        (Factor::Booster, booster_factor(procedure, signals, explanations)),
    ];
    for (factor, value) in factors {
        if let Some(value) = value {
            let slot = result.breakdown.get_mut(factor);
            slot.applicable = true;
            slot.value = value.clamp(0.0, 1.0);
        }
    }

    let denominator = result.breakdown.applicable_weight();
    if denominator > 0.0 && denominator.is_finite() {
        let mut score = 0.0;
        for factor in Factor::ALL {
            let slot = result.breakdown.get_mut(factor);
            if slot.applicable {
                slot.contribution = slot.weight * slot.value / denominator;
                score += slot.contribution;
            }
        }
        result.score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    result.highlights = highlights(procedure, signals);
    result
}

fn find_exclusion(procedure: &Procedure, signals: &Signals<'_>) -> Option<ExclusionHit> {
    let exclusion = &procedure.exclusion;

    // A shared segment is not enough: `payment-api` must not veto on `payment`.
    for pattern in normalized(&exclusion.excluded_services) {
        if let Some(service) = signals.services.iter().find(|s| s.contains(pattern.as_str())) {
            return Some(ExclusionHit {
                rule: ExclusionRule::ExcludedService,
                evidence: format!("service '{service}'"),
                pattern,
            });
        }
    }

    for condition in normalized(&exclusion.excluded_conditions) {
        if signals.query.contains(&condition) {
            return Some(ExclusionHit {
                rule: ExclusionRule::ExcludedCondition,
                pattern: condition,
                evidence: "query".to_string(),
            });
        }
    }

    for symptom in normalized(&exclusion.conflicting_symptoms) {
        let evidence = if signals.query.contains(&symptom) {
            Some("query".to_string())
        } else {
            signals
                .logs
                .iter()
                .find(|(line, _)| line.contains(&symptom))
                .map(|(_, original)| format!("log '{original}'"))
        };
        if let Some(evidence) = evidence {
            return Some(ExclusionHit {
                rule: ExclusionRule::ConflictingSymptom,
                pattern: symptom,
                evidence,
            });
        }
    }
    None
}

fn keyword_factor(
    procedure: &Procedure,
    signals: &Signals<'_>,
    explanations: &mut Vec<Explanation>,
) -> Option<f64> {
    let keywords = normalized(&procedure.trigger_keywords);
    if keywords.is_empty() {
        return None;
    }
    let mut matched = 0usize;
    for keyword in &keywords {
        if signals.query.contains(keyword.as_str()) {
            matched += 1;
            explanations.push(Explanation {
                factor: Factor::Keyword,
                pattern: keyword.clone(),
                evidence: "query".to_string(),
            });
        }
    }
    Some(ratio(matched, keywords.len()))
}

fn service_factor(
    procedure: &Procedure,
    signals: &Signals<'_>,
    explanations: &mut Vec<Explanation>,
) -> Option<f64> {
    let filters = normalized(&procedure.applicability.service_filters);
    if filters.is_empty() {
        return None;
    }
    let mut full = false;
    let mut partial = 0usize;
    for filter in &filters {
        let find = |level: Overlap| {
            signals
                .services
                .iter()
                .find(|service| overlap(filter, service) == level)
                .map(|service| (level, service))
        };
        match find(Overlap::Full).or_else(|| find(Overlap::Partial)) {
            Some((Overlap::Full, service)) => {
                full = true;
                explanations.push(Explanation {
                    factor: Factor::Service,
                    pattern: filter.clone(),
                    evidence: service.clone(),
                });
            }
            Some((_, service)) => {
                partial += 1;
                explanations.push(Explanation {
                    factor: Factor::Service,
                    pattern: filter.clone(),
                    evidence: format!("{service} (partial)"),
                });
            }
            None => {}
        }
    }
    Some(if full {
        1.0
    } else {
        ratio(partial, filters.len())
    })
}

fn metric_factor(
    procedure: &Procedure,
    signals: &Signals<'_>,
    explanations: &mut Vec<Explanation>,
) -> Option<f64> {
    let patterns = normalized(&procedure.applicability.metric_patterns);
    if patterns.is_empty() {
        return None;
    }
    let mut matched = 0usize;
    for pattern in &patterns {
        let matcher = MetricPattern::new(pattern);
        if let Some((_, key, _)) = signals.metrics.iter().find(|(k, _, _)| matcher.matches(k)) {
            matched += 1;
            explanations.push(Explanation {
                factor: Factor::Metric,
                pattern: pattern.clone(),
                evidence: (*key).to_string(),
            });
        }
    }
    Some(ratio(matched, patterns.len()))
}

fn log_factor(
    procedure: &Procedure,
    signals: &Signals<'_>,
    explanations: &mut Vec<Explanation>,
) -> Option<f64> {
    let patterns = normalized(&procedure.applicability.log_patterns);
    if patterns.is_empty() {
        return None;
    }
    let mut matched = 0usize;
    for pattern in &patterns {
        if let Some((_, line)) = signals.logs.iter().find(|(l, _)| l.contains(pattern.as_str())) {
            matched += 1;
            explanations.push(Explanation {
                factor: Factor::Log,
                pattern: pattern.clone(),
                evidence: (*line).to_string(),
            });
        }
    }
    Some(ratio(matched, patterns.len()))
}

/// Sum of satisfied booster amounts, capped at 1.
fn booster_factor(
    procedure: &Procedure,
    signals: &Signals<'_>,
    explanations: &mut Vec<Explanation>,
) -> Option<f64> {
    if procedure.confidence_boosters.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for booster in &procedure.confidence_boosters {
        let condition = booster.condition.trim().to_lowercase();
        if condition.is_empty() {
            continue;
        }
        let evidence = signals
            .affected
            .iter()
            .find(|s| s.contains(&condition))
            .map(|s| format!("service '{s}'"))
            .or_else(|| {
                signals
                    .logs
                    .iter()
                    .find(|(l, _)| l.contains(&condition))
                    .map(|(_, l)| format!("log '{l}'"))
            })
            .or_else(|| {
                signals
                    .alerts
                    .iter()
                    .find(|(a, _)| a.contains(&condition))
                    .map(|(_, a)| format!("alert '{a}'"))
            })
            .or_else(|| {
                signals
                    .metrics
                    .iter()
                    .find(|(k, _, _)| k.contains(&condition))
                    .map(|(_, k, _)| format!("metric '{k}'"))
            });
        if let Some(evidence) = evidence {
            total += booster.boost_amount.max(0.0);
            explanations.push(Explanation {
                factor: Factor::Booster,
                pattern: condition,
                evidence,
            });
        }
    }
    Some(f64::min(total, 1.0))
}

fn highlights(procedure: &Procedure, signals: &Signals<'_>) -> ContextHighlights {
    let applicability = &procedure.applicability;
    let filters = normalized(&applicability.service_filters);
    let metric_patterns: Vec<MetricPattern> = normalized(&applicability.metric_patterns)
        .iter()
        .map(|p| MetricPattern::new(p))
        .collect();
    let log_patterns = normalized(&applicability.log_patterns);
    let symptom_terms: Vec<String> = normalized(&applicability.symptom_keywords)
        .into_iter()
        .chain(normalized(&procedure.trigger_keywords))
        .collect();

    ContextHighlights {
        services: signals
            .services
            .iter()
            .filter(|s| filters.iter().any(|f| overlap(f, s) != Overlap::None))
            .cloned()
            .collect(),
        metrics: signals
            .metrics
            .iter()
            .filter(|(k, _, _)| metric_patterns.iter().any(|p| p.matches(k)))
            .map(|(_, key, value)| ((*key).to_string(), *value))
            .collect(),
        logs: signals
            .logs
            .iter()
            .filter(|(l, _)| log_patterns.iter().any(|p| l.contains(p.as_str())))
            .map(|(_, line)| (*line).to_string())
            .collect(),
        symptoms: signals
            .symptoms
            .iter()
            .filter(|s| symptom_terms.iter().any(|t| t.contains(s.as_str())))
            .cloned()
            .collect(),
    }
}

fn ratio(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    matched as f64 / total as f64
}
