use crate::error::{GatherError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_BUDGET_MS: u64 = 25_000;
pub const DEFAULT_CONCURRENCY: usize = 5;
const MAX_CONCURRENCY: usize = 64;

/// Budget, parallelism and lexical vocabulary for one [`crate::Gatherer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatherConfig {
    /// Hard wall-clock deadline for the whole gathering stage
    pub budget_ms: u64,

    /// Maximum number of probes running at the same time
    pub concurrency: usize,

    /// Optional cap for a single probe; never extends past the overall budget
    pub probe_timeout_ms: Option<u64>,

    pub vocabulary: Vocabulary,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            budget_ms: DEFAULT_BUDGET_MS,
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout_ms: None,
            vocabulary: Vocabulary::default(),
        }
    }
}

impl GatherConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(GatherError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(GatherError::InvalidConfig(format!(
                "concurrency must be at most {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if self.probe_timeout_ms == Some(0) {
            return Err(GatherError::InvalidConfig(
                "probe_timeout_ms must be positive when set".to_string(),
            ));
        }
        self.vocabulary.validate()
    }
}

/// Word lists used by the lexical extraction step.
///
/// All entries are matched lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Vocabulary {
    /// Service names recognised anywhere in the query
    pub services: Vec<String>,

    /// Role suffixes that form compounds such as `payment-consumer`
    pub roles: Vec<String>,

    pub symptoms: Vec<String>,

    /// Symptom word to metric names worth querying when it appears
    pub metric_hints: BTreeMap<String, Vec<String>>,
}

const DEFAULT_SERVICES: &[&str] = &[
    "payment",
    "order",
    "user",
    "auth",
    "notification",
    "kafka",
    "elasticsearch",
    "logstash",
    "msk",
    "kinesis",
    "redis",
    "postgres",
    "mysql",
];

const DEFAULT_ROLES: &[&str] = &["service", "consumer", "producer", "processor", "api", "worker"];

const DEFAULT_SYMPTOMS: &[&str] = &[
    "lag",
    "latency",
    "slow",
    "high",
    "error",
    "timeout",
    "failure",
    "down",
    "degraded",
    "spike",
    "drop",
    "increase",
    "memory",
    "cpu",
    "disk",
    "connection",
    "queue",
];

const DEFAULT_METRIC_HINTS: &[(&str, &[&str])] = &[
    ("lag", &["consumer_lag", "offset_lag", "replication_lag"]),
    (
        "latency",
        &["response_time", "query_latency", "p95_latency", "p99_latency"],
    ),
    ("error", &["error_rate", "error_count", "failure_rate"]),
    (
        "throughput",
        &["requests_per_sec", "messages_per_sec", "events_per_sec"],
    ),
    ("memory", &["memory_usage", "heap_usage", "jvm_memory"]),
    ("cpu", &["cpu_usage", "cpu_percent"]),
    ("queue", &["queue_depth", "queue_size", "pending_messages"]),
];

/// Queried when the query names no symptom with metric hints.
pub const FALLBACK_METRICS: &[&str] = &["error_rate", "response_time", "cpu_usage"];

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            services: owned(DEFAULT_SERVICES),
            roles: owned(DEFAULT_ROLES),
            symptoms: owned(DEFAULT_SYMPTOMS),
            metric_hints: DEFAULT_METRIC_HINTS
                .iter()
                .map(|(symptom, metrics)| ((*symptom).to_string(), owned(metrics)))
                .collect(),
        }
    }
}

impl Vocabulary {
    /// Add service names not already known, lowercased. Blank names are ignored.
    pub fn extend_services<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if !name.is_empty() && !self.services.contains(&name) {
                self.services.push(name);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let lists = [
            ("services", &self.services),
            ("roles", &self.roles),
            ("symptoms", &self.symptoms),
        ];
        for (field, words) in lists {
            if let Some(pos) = words.iter().position(|w| w.trim().is_empty()) {
                return Err(GatherError::InvalidConfig(format!(
                    "vocabulary.{field}[{pos}] is blank"
                )));
            }
        }
        Ok(())
    }
}
