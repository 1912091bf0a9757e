use serde::{Deserialize, Serialize};
use sop_catalog::{CatalogSnapshot, Procedure};
use sop_gather::SignalBundle;
use sop_match::{Evaluation, MatchResult, SelectionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStatus {
    Success,
    DisambiguationNeeded,
    NoMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Single,
    Ambiguous,
    Multiple,
    None,
}

/// What was known about the environment when the decision was made.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub mentioned_services: Vec<String>,
    pub affected_services: Vec<String>,
    pub symptom_keywords: Vec<String>,
    pub metrics_collected: usize,
    pub log_lines: usize,
    pub active_alerts: Vec<String>,
    /// Probes that timed out or failed; their evidence is missing from the decision
    pub unavailable_probes: Vec<String>,
    pub complete: bool,
    pub elapsed_ms: u64,
}

impl ContextSummary {
    pub fn from_bundle(bundle: &SignalBundle) -> Self {
        Self {
            mentioned_services: bundle.mentioned_services.clone(),
            affected_services: bundle.affected_services.clone(),
            symptom_keywords: bundle.symptom_keywords.clone(),
            metrics_collected: bundle.metrics.len(),
            log_lines: bundle.log_patterns.len(),
            active_alerts: bundle.active_alerts.clone(),
            unavailable_probes: bundle
                .unavailable_probes()
                .into_iter()
                .map(str::to_string)
                .collect(),
            complete: bundle.is_complete(),
            elapsed_ms: bundle.elapsed_ms,
        }
    }
}

/// A procedure offered next to (or instead of) the chosen one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub procedure_id: String,
    pub name: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Agent-facing answer to one routed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResponse {
    pub status: RoutingStatus,
    pub match_type: MatchType,
    pub query: String,
    pub context: ContextSummary,
    /// Full record of the procedure to follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<Procedure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_default: Option<String>,
    pub instructions: String,
    /// Every scored procedure, ranked, with its factor breakdown
    pub scores: Vec<MatchResult>,
}

impl RoutingResponse {
    pub fn render(
        bundle: &SignalBundle,
        evaluation: Evaluation,
        snapshot: &CatalogSnapshot,
    ) -> Self {
        let Evaluation { results, outcome } = evaluation;
        let alternative = |result: &MatchResult| Alternative {
            procedure_id: result.procedure_id.clone(),
            name: result.procedure_name.clone(),
            confidence: result.score,
            description: snapshot
                .get(&result.procedure_id)
                .map(|p| p.description.clone())
                .unwrap_or_default(),
        };

        let mut response = Self {
            status: RoutingStatus::NoMatch,
            match_type: MatchType::None,
            query: bundle.query.clone(),
            context: ContextSummary::from_bundle(bundle),
            procedure: None,
            confidence: None,
            alternatives: Vec::new(),
            question: None,
            suggested_default: None,
            instructions: String::new(),
            scores: Vec::new(),
        };

        match outcome {
            SelectionOutcome::SingleMatch { selected } => {
                response.status = RoutingStatus::Success;
                response.match_type = MatchType::Single;
                response.confidence = Some(selected.score);
                response.procedure = snapshot.get(&selected.procedure_id).cloned();
                response.instructions = follow_instructions(response.procedure.as_ref());
            }
            SelectionOutcome::MultiOption { top, alternatives } => {
                response.status = RoutingStatus::Success;
                response.match_type = MatchType::Multiple;
                response.confidence = Some(top.score);
                response.procedure = snapshot.get(&top.procedure_id).cloned();
                response.alternatives = alternatives.iter().map(alternative).collect();
                response.instructions = format!(
                    "Low confidence ({}%): '{}' is the closest procedure. Check that it fits \
                     before following it, or switch to one of the alternatives.",
                    top.confidence_percent(),
                    top.procedure_name
                );
            }
            SelectionOutcome::Disambiguation {
                candidates,
                question,
                suggested_default,
            } => {
                response.status = RoutingStatus::DisambiguationNeeded;
                response.match_type = MatchType::Ambiguous;
                response.alternatives = candidates.iter().map(alternative).collect();
                response.instructions = format!(
                    "Ask the question and continue with the chosen procedure. \
                     Without an answer, use '{suggested_default}'."
                );
                response.question = Some(question);
                response.suggested_default = Some(suggested_default);
            }
            SelectionOutcome::NoMatch { best_score } => {
                response.instructions = match best_score {
                    Some(score) if score > 0.0 => format!(
                        "No procedure fits this query (best score {score:.2}). Investigate \
                         manually, and consider adding a procedure for this scenario."
                    ),
                    _ => "No procedure fits this query. Investigate manually, and consider \
                          adding a procedure for this scenario."
                        .to_string(),
                };
            }
        }
        response.scores = results;
        response
    }
}

fn follow_instructions(procedure: Option<&Procedure>) -> String {
    let Some(procedure) = procedure else {
        return "The selected procedure is no longer in the catalog; route the query again."
            .to_string();
    };
    let mut text = format!(
        "Follow '{}' step by step ({} step(s)).",
        procedure.name,
        procedure.workflow_steps.len()
    );
    if let Some(first) = procedure.workflow_steps.first() {
        text.push_str(&format!(" Start with step {}: {}.", first.step_number, first.title));
    }
    if let Some(criteria) = &procedure.escalation_criteria {
        text.push_str(&format!(" Escalate when: {criteria}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use sop_match::Matcher;

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(vec![
            Procedure::new("disk-full", "Disk full", vec!["disk full".into()])
                .with_description("Free space on a full volume")
                .with_step("Find the largest directories", &["du"]),
            Procedure::new("disk-slow", "Disk slow", vec!["disk slow".into()]),
        ])
    }

    fn bundle(query: &str) -> SignalBundle {
        SignalBundle {
            query: query.to_string(),
            normalized_query: query.to_lowercase(),
            ..SignalBundle::default()
        }
    }

    fn respond(query: &str) -> RoutingResponse {
        let snapshot = snapshot();
        let bundle = bundle(query);
        let evaluation = Matcher::default().evaluate(&bundle, snapshot.procedures());
        RoutingResponse::render(&bundle, evaluation, &snapshot)
    }

    #[test]
    fn single_match_carries_the_full_procedure() {
        let response = respond("Disk full on db-1");
        assert_eq!(response.status, RoutingStatus::Success);
        assert_eq!(response.match_type, MatchType::Single);
        let procedure = response.procedure.unwrap();
        assert_eq!(procedure.id, "disk-full");
        assert_eq!(procedure.workflow_steps.len(), 1);
        assert!(response
            .instructions
            .contains("Start with step 1: Find the largest directories"));
        assert_eq!(response.scores.len(), 2);
    }

    #[test]
    fn disambiguation_lists_candidates_and_question() {
        let response = respond("disk full and disk slow");
        assert_eq!(response.status, RoutingStatus::DisambiguationNeeded);
        assert_eq!(response.match_type, MatchType::Ambiguous);
        assert!(response.procedure.is_none());
        assert_eq!(response.alternatives.len(), 2);
        assert_eq!(response.alternatives[0].description, "Free space on a full volume");
        assert_eq!(response.suggested_default.as_deref(), Some("disk-full"));
        assert!(response.question.unwrap().contains("Disk slow"));
    }

    #[test]
    fn no_match_explains_itself() {
        let response = respond("certificate expired");
        assert_eq!(response.status, RoutingStatus::NoMatch);
        assert_eq!(response.match_type, MatchType::None);
        assert!(response.instructions.starts_with("No procedure fits"));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "no_match");
        assert!(json.get("procedure").is_none());
        assert_eq!(json["scores"].as_array().unwrap().len(), 2);
    }
}
