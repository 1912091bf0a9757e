use crate::error::{Result, RouterError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sop_gather::{
    Probe, ProbeOutput, ProbeRegistry, ProbeRequest, ALERTS_PROBE, HEALTH_PROBE, LOGS_PROBE,
    METRICS_PROBE,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    #[default]
    Healthy,
    Degraded,
    Down,
}

/// Recorded state of one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceState {
    pub health: Health,
    pub metrics: BTreeMap<String, f64>,
    pub logs: Vec<String>,
    pub alerts: Vec<String>,
    /// Dependencies whose health is reported alongside this service
    pub related_services: Vec<String>,
}

/// Static description of an environment, standing in for live health checks,
/// metric stores, log search and alerting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Environment {
    pub services: BTreeMap<String, ServiceState>,
}

impl Environment {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| RouterError::Environment(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            RouterError::Environment(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&raw)
            .map_err(|err| RouterError::Environment(format!("{}: {err}", path.display())))
    }

    fn requested<'a>(
        &'a self,
        request: &'a ProbeRequest,
    ) -> impl Iterator<Item = (&'a str, &'a ServiceState)> + 'a {
        request
            .services
            .iter()
            .filter_map(|name| self.services.get(name).map(|state| (name.as_str(), state)))
    }

    /// Mentioned services by health, plus unhealthy related services.
    pub fn health(&self, request: &ProbeRequest) -> ProbeOutput {
        let mut affected = Vec::new();
        let mut healthy = Vec::new();
        for (name, state) in self.requested(request) {
            if state.health == Health::Healthy {
                healthy.push(name.to_string());
            } else {
                affected.push(name.to_string());
            }
            for related in &state.related_services {
                let unhealthy = self
                    .services
                    .get(related)
                    .is_some_and(|s| s.health != Health::Healthy);
                if unhealthy {
                    affected.push(related.clone());
                }
            }
        }
        ProbeOutput::Health { affected, healthy }
    }

    /// Hinted metrics recorded for the mentioned services.
    pub fn metrics(&self, request: &ProbeRequest) -> ProbeOutput {
        let mut values = BTreeMap::new();
        for (name, state) in self.requested(request) {
            for metric in &request.metric_hints {
                if let Some(value) = state.metrics.get(metric) {
                    values.insert(format!("{name}.{metric}"), *value);
                }
            }
        }
        ProbeOutput::Metrics { values }
    }

    pub fn logs(&self, request: &ProbeRequest) -> ProbeOutput {
        let lines = self
            .requested(request)
            .flat_map(|(name, state)| state.logs.iter().map(move |line| format!("{name}: {line}")))
            .collect();
        ProbeOutput::Logs { lines }
    }

    pub fn alerts(&self, request: &ProbeRequest) -> ProbeOutput {
        let alerts = self
            .requested(request)
            .flat_map(|(name, state)| {
                state
                    .alerts
                    .iter()
                    .map(move |alert| format!("{name}: {alert}"))
            })
            .collect();
        ProbeOutput::Alerts { alerts }
    }

    /// Health, metrics, logs and alerts probes answering from this environment.
    pub fn into_probes(self) -> Result<ProbeRegistry> {
        let environment = Arc::new(self);
        let mut probes = ProbeRegistry::new();
        for (name, kind) in [
            (HEALTH_PROBE, FixtureKind::Health),
            (METRICS_PROBE, FixtureKind::Metrics),
            (LOGS_PROBE, FixtureKind::Logs),
            (ALERTS_PROBE, FixtureKind::Alerts),
        ] {
            probes.register(
                name,
                FixtureProbe {
                    environment: Arc::clone(&environment),
                    kind,
                },
            )?;
        }
        Ok(probes)
    }
}

#[derive(Debug, Clone, Copy)]
enum FixtureKind {
    Health,
    Metrics,
    Logs,
    Alerts,
}

struct FixtureProbe {
    environment: Arc<Environment>,
    kind: FixtureKind,
}

#[async_trait]
impl Probe for FixtureProbe {
    async fn run(&self, request: &ProbeRequest) -> anyhow::Result<ProbeOutput> {
        let env = &self.environment;
        Ok(match self.kind {
            FixtureKind::Health => env.health(request),
            FixtureKind::Metrics => env.metrics(request),
            FixtureKind::Logs => env.logs(request),
            FixtureKind::Alerts => env.alerts(request),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FIXTURE: &str = include_str!("../../../fixtures/environment.json");

    fn request(services: &[&str], hints: &[&str]) -> ProbeRequest {
        ProbeRequest {
            services: services.iter().map(|s| s.to_string()).collect(),
            metric_hints: hints.iter().map(|s| s.to_string()).collect(),
            ..ProbeRequest::default()
        }
    }

    #[test]
    fn bundled_fixture_parses() {
        let env = Environment::from_json_str(FIXTURE).unwrap();
        assert!(env.services.contains_key("payment-consumer"));
        assert_eq!(env.services["msk"].health, Health::Degraded);
    }

    #[test]
    fn health_reports_unhealthy_dependencies() {
        let env = Environment::from_json_str(FIXTURE).unwrap();
        let ProbeOutput::Health { affected, healthy } =
            env.health(&request(&["payment-consumer", "order", "unknown"], &[]))
        else {
            panic!("health probe returned another kind");
        };
        assert_eq!(affected, vec!["payment-consumer", "msk"]);
        assert_eq!(healthy, vec!["order"]);
    }

    #[test]
    fn metrics_follow_the_hints() {
        let env = Environment::from_json_str(FIXTURE).unwrap();
        let output = env.metrics(&request(
            &["payment-consumer", "payment"],
            &["consumer_lag", "offset_lag"],
        ));
        assert_eq!(
            output,
            ProbeOutput::Metrics {
                values: BTreeMap::from([("payment-consumer.consumer_lag".to_string(), 15000.0)])
            }
        );
    }

    #[test]
    fn logs_and_alerts_are_prefixed_with_the_service() {
        let env = Environment::from_json_str(FIXTURE).unwrap();
        let ProbeOutput::Alerts { alerts } = env.alerts(&request(&["logstash"], &[])) else {
            panic!("alerts probe returned another kind");
        };
        assert_eq!(alerts, vec!["logstash: LogstashQueueFull"]);

        let ProbeOutput::Logs { lines } = env.logs(&request(&["logstash"], &[])) else {
            panic!("logs probe returned another kind");
        };
        assert!(lines.iter().all(|l| l.starts_with("logstash: ")));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Environment::from_json_str(r#"{"services": {"a": {"helth": "down"}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("helth"), "{err}");
    }

    #[test]
    fn registry_has_the_four_standard_probes() {
        let probes = Environment::default().into_probes().unwrap();
        assert_eq!(probes.names(), vec!["alerts", "health", "logs", "metrics"]);
    }
}
