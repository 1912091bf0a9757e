use crate::extract::QuerySignals;
use crate::probe::ProbeOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Completed,
    TimedOut,
    Failed,
}

/// Availability record for one probe in one gathering run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub name: String,
    pub status: ProbeStatus,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeReport {
    pub fn is_available(&self) -> bool {
        self.status == ProbeStatus::Completed
    }
}

/// Normalized, time-bounded evidence about one query.
///
/// Every list is sorted and deduplicated, so two bundles built from the same
/// probe outputs compare equal apart from their timing fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalBundle {
    pub query: String,
    pub normalized_query: String,
    pub mentioned_services: Vec<String>,
    pub symptom_keywords: Vec<String>,
    /// Services a probe confirmed unhealthy
    pub affected_services: Vec<String>,
    pub healthy_services: Vec<String>,
    /// Metric values keyed `<service>.<metric>`
    pub metrics: BTreeMap<String, f64>,
    pub log_patterns: Vec<String>,
    pub active_alerts: Vec<String>,
    pub probes: Vec<ProbeReport>,
    pub started_at_unix_ms: u64,
    pub elapsed_ms: u64,
}

/// Evidence a caller already has, merged into a bundle instead of probing for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuppliedContext {
    pub affected_services: Vec<String>,
    pub healthy_services: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
    pub log_patterns: Vec<String>,
    pub active_alerts: Vec<String>,
}

impl SignalBundle {
    /// Bundle holding only what the query text itself yields.
    pub fn from_signals(query: &str, signals: &QuerySignals) -> Self {
        let mut bundle = Self {
            query: query.to_string(),
            normalized_query: signals.normalized.clone(),
            mentioned_services: signals.services.clone(),
            symptom_keywords: signals.symptoms.clone(),
            ..Self::default()
        };
        bundle.finalize();
        bundle
    }

    pub fn with_supplied(mut self, supplied: SuppliedContext) -> Self {
        self.affected_services.extend(supplied.affected_services);
        self.healthy_services.extend(supplied.healthy_services);
        self.metrics.extend(supplied.metrics);
        self.log_patterns.extend(supplied.log_patterns);
        self.active_alerts.extend(supplied.active_alerts);
        self.finalize();
        self
    }

    pub fn with_affected(mut self, service: impl Into<String>) -> Self {
        self.affected_services.push(service.into());
        self.finalize();
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.log_patterns.push(line.into());
        self.finalize();
        self
    }

    pub fn with_alert(mut self, alert: impl Into<String>) -> Self {
        self.active_alerts.push(alert.into());
        self.finalize();
        self
    }

    /// Fold one probe's output into the bundle.
    pub fn merge(&mut self, output: ProbeOutput) {
        match output {
            ProbeOutput::Health { affected, healthy } => {
                self.affected_services.extend(affected);
                self.healthy_services.extend(healthy);
            }
            ProbeOutput::Metrics { values } => self.metrics.extend(values),
            ProbeOutput::Logs { lines } => self.log_patterns.extend(lines),
            ProbeOutput::Alerts { alerts } => self.active_alerts.extend(alerts),
        }
    }

    /// Sort and deduplicate every list. A service reported both affected and
    /// healthy counts as affected.
    pub fn finalize(&mut self) {
        for list in [
            &mut self.mentioned_services,
            &mut self.symptom_keywords,
            &mut self.affected_services,
            &mut self.healthy_services,
            &mut self.log_patterns,
            &mut self.active_alerts,
        ] {
            list.sort();
            list.dedup();
        }
        let affected = &self.affected_services;
        self.healthy_services.retain(|s| !affected.contains(s));
        self.probes.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Mentioned and affected services together, sorted.
    pub fn all_services(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .mentioned_services
            .iter()
            .chain(&self.affected_services)
            .map(String::as_str)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn available_probes(&self) -> Vec<&str> {
        self.probes
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn unavailable_probes(&self) -> Vec<&str> {
        self.probes
            .iter()
            .filter(|p| !p.is_available())
            .map(|p| p.name.as_str())
            .collect()
    }

    /// True when every probe that ran produced a result.
    pub fn is_complete(&self) -> bool {
        self.probes.iter().all(ProbeReport::is_available)
    }
}
