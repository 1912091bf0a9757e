use crate::config::{Vocabulary, FALLBACK_METRICS};
use crate::error::{GatherError, Result};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Words that can precede a role suffix without naming a service ("high consumer lag").
const STOPWORDS: &[&str] = &[
    "a", "all", "an", "any", "are", "for", "from", "in", "is", "low", "my", "of", "on", "our",
    "some", "that", "the", "this", "to", "very", "was", "we", "with",
];

/// Signals derived from the query text alone, without any probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuerySignals {
    pub normalized: String,
    /// Candidate service names, sorted
    pub services: Vec<String>,
    /// Vocabulary symptoms present in the query, in vocabulary order
    pub symptoms: Vec<String>,
    /// Metric names worth querying for the symptoms present, sorted
    pub metric_hints: Vec<String>,
}

/// Lowercase and collapse whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lexical rules that turn a query into [`QuerySignals`].
///
/// Services come from three rules: `<name>-<role>` / `<name> <role>`
/// compounds (`payment-consumer`, `order service`), vocabulary names appearing
/// as a word or a dash/underscore segment, and explicit `service: <name>` labels.
#[derive(Debug, Clone)]
pub struct QueryExtractor {
    vocabulary: Vocabulary,
    /// `None` when the vocabulary has no roles
    compound: Option<Regex>,
    label: Regex,
}

impl QueryExtractor {
    pub fn new(vocabulary: Vocabulary) -> Result<Self> {
        let roles: Vec<String> = vocabulary
            .roles
            .iter()
            .map(|role| regex::escape(&role.trim().to_lowercase()))
            .filter(|role| !role.is_empty())
            .collect();
        let compound = if roles.is_empty() {
            None
        } else {
            Some(build_regex(
                &format!(
                    r"\b([a-z0-9][a-z0-9_]*(?:-[a-z0-9_]+)*?)(-|\s+)({})(?:$|[^a-z0-9_])",
                    roles.join("|")
                ),
                "vocabulary.roles",
            )?)
        };
        let label = build_regex(r"\bservice:\s*([a-z0-9][a-z0-9_-]*)", "service label")?;
        Ok(Self {
            vocabulary,
            compound,
            label,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn extract(&self, query: &str) -> QuerySignals {
        let normalized = normalize_query(query);
        QuerySignals {
            services: self.services(&normalized),
            symptoms: self.symptoms(&normalized),
            metric_hints: self.metric_hints(&normalized),
            normalized,
        }
    }

    fn services(&self, normalized: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();

        let compounds = self
            .compound
            .iter()
            .flat_map(|re| re.captures_iter(normalized));
        for caps in compounds {
            let (Some(name), Some(sep), Some(role)) = (caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let name = name.as_str().trim_matches(|c| c == '-' || c == '_');
            if !self.is_service_name(name) {
                continue;
            }
            found.push(name.to_string());
            if sep.as_str() == "-" {
                found.push(format!("{name}-{}", role.as_str()));
            }
        }

        for caps in self.label.captures_iter(normalized) {
            if let Some(name) = caps.get(1) {
                let name = name.as_str().trim_end_matches(['-', '_']);
                if self.is_service_name(name) {
                    found.push(name.to_string());
                }
            }
        }

        for token in tokens(normalized) {
            for known in &self.vocabulary.services {
                if token == known || token.split(['-', '_']).any(|seg| seg == known) {
                    found.push(known.clone());
                }
            }
        }

        found.sort();
        found.dedup();
        found
    }

    fn is_service_name(&self, name: &str) -> bool {
        !name.is_empty()
            && !STOPWORDS.contains(&name)
            && !self.vocabulary.symptoms.iter().any(|s| s == name)
            && !self.vocabulary.roles.iter().any(|r| r == name)
    }

    fn symptoms(&self, normalized: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for symptom in &self.vocabulary.symptoms {
            let symptom = symptom.to_lowercase();
            if normalized.contains(&symptom) && !out.contains(&symptom) {
                out.push(symptom);
            }
        }
        out
    }

    fn metric_hints(&self, normalized: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .vocabulary
            .metric_hints
            .iter()
            .filter(|(symptom, _)| normalized.contains(symptom.to_lowercase().as_str()))
            .flat_map(|(_, metrics)| metrics.iter().cloned())
            .collect();
        if out.is_empty() {
            out = FALLBACK_METRICS.iter().map(|m| (*m).to_string()).collect();
        }
        out.sort();
        out.dedup();
        out
    }
}

fn build_regex(pattern: &str, what: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .build()
        .map_err(|err| GatherError::InvalidConfig(format!("{what}: {err}")))
}

fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .map(|t| t.trim_matches(|c| c == '-' || c == '_'))
        .filter(|t| !t.is_empty())
}
