use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "1.0".to_string()
}

/// Standard operating procedure: matching criteria plus the workflow a caller
/// follows once the procedure is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(alias = "sop_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,

    /// Case-insensitive substrings of the query that suggest this procedure
    pub trigger_keywords: Vec<String>,
    #[serde(default)]
    pub applicability: Applicability,
    #[serde(default)]
    pub exclusion: Exclusion,
    #[serde(default)]
    pub confidence_boosters: Vec<ConfidenceBooster>,

    #[serde(default)]
    pub workflow_steps: Vec<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common_mistakes: Vec<CommonMistake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_criteria: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_sops: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_minutes: Option<u32>,
}

/// Signals that make a procedure relevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicability {
    /// Service name fragments (e.g. `kafka`, `payment`)
    #[serde(default)]
    pub service_filters: Vec<String>,
    /// Metric name patterns; substrings, or globs when they contain `*`, `?` or `[`
    #[serde(default)]
    pub metric_patterns: Vec<String>,
    #[serde(default)]
    pub log_patterns: Vec<String>,
    #[serde(default)]
    pub symptom_keywords: Vec<String>,
}

impl Applicability {
    pub fn is_empty(&self) -> bool {
        self.service_filters.is_empty()
            && self.metric_patterns.is_empty()
            && self.log_patterns.is_empty()
            && self.symptom_keywords.is_empty()
    }
}

/// Vetoes. Any hit forces the procedure out of the running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    #[serde(default)]
    pub excluded_services: Vec<String>,
    #[serde(default)]
    pub excluded_conditions: Vec<String>,
    #[serde(default)]
    pub conflicting_symptoms: Vec<String>,
}

impl Exclusion {
    pub fn is_empty(&self) -> bool {
        self.excluded_services.is_empty()
            && self.excluded_conditions.is_empty()
            && self.conflicting_symptoms.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBooster {
    /// Substring looked up in corroborating signals (affected services, logs, alerts, metrics)
    pub condition: String,
    /// Added to the booster factor when the condition holds; within `[0, 1]`
    #[serde(default = "ConfidenceBooster::default_amount")]
    pub boost_amount: f64,
}

impl ConfidenceBooster {
    fn default_amount() -> f64 {
        0.1
    }

    pub fn new(condition: impl Into<String>, boost_amount: f64) -> Self {
        Self {
            condition: condition.into(),
            boost_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tools_to_use: Vec<String>,
    #[serde(default)]
    pub guidance: String,
    #[serde(default)]
    pub success_criteria: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_logic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonMistake {
    pub mistake: String,
    pub why_its_wrong: String,
    pub correct_approach: String,
}

impl Procedure {
    /// Bare procedure with no criteria beyond its keywords and no steps.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        trigger_keywords: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: default_version(),
            trigger_keywords,
            applicability: Applicability::default(),
            exclusion: Exclusion::default(),
            confidence_boosters: Vec::new(),
            workflow_steps: Vec::new(),
            common_mistakes: Vec::new(),
            escalation_criteria: None,
            tags: Vec::new(),
            related_sops: Vec::new(),
            estimated_duration_minutes: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_applicability(mut self, applicability: Applicability) -> Self {
        self.applicability = applicability;
        self
    }

    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusion = exclusion;
        self
    }

    pub fn with_booster(mut self, condition: impl Into<String>, amount: f64) -> Self {
        self.confidence_boosters
            .push(ConfidenceBooster::new(condition, amount));
        self
    }

    /// Append a step numbered after the current last one.
    pub fn with_step(mut self, title: impl Into<String>, tools: &[&str]) -> Self {
        let step_number = u32::try_from(self.workflow_steps.len()).unwrap_or(u32::MAX - 1) + 1;
        self.workflow_steps.push(WorkflowStep {
            step_number,
            title: title.into(),
            description: String::new(),
            tools_to_use: tools.iter().map(|t| (*t).to_string()).collect(),
            guidance: String::new(),
            success_criteria: String::new(),
            next_step_logic: None,
        });
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Total of all booster amounts, regardless of whether they fire.
    pub fn max_boost(&self) -> f64 {
        self.confidence_boosters
            .iter()
            .map(|b| b.boost_amount)
            .sum()
    }

    pub fn step(&self, step_number: u32) -> Option<&WorkflowStep> {
        self.workflow_steps
            .iter()
            .find(|s| s.step_number == step_number)
    }

    /// Distinct tool identifiers referenced across all steps, in first-use order.
    pub fn tools(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for step in &self.workflow_steps {
            for tool in &step.tools_to_use {
                if !out.contains(&tool.as_str()) {
                    out.push(tool);
                }
            }
        }
        out
    }
}
