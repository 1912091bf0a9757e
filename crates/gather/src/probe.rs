use crate::error::{GatherError, Result};
use crate::extract::QuerySignals;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const HEALTH_PROBE: &str = "health";
pub const METRICS_PROBE: &str = "metrics";
pub const LOGS_PROBE: &str = "logs";
pub const ALERTS_PROBE: &str = "alerts";

/// What every probe is given: the query and what lexical extraction found in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub query: String,
    pub normalized_query: String,
    pub services: Vec<String>,
    pub symptoms: Vec<String>,
    pub metric_hints: Vec<String>,
}

impl ProbeRequest {
    pub fn new(query: &str, signals: &QuerySignals) -> Self {
        Self {
            query: query.to_string(),
            normalized_query: signals.normalized.clone(),
            services: signals.services.clone(),
            symptoms: signals.symptoms.clone(),
            metric_hints: signals.metric_hints.clone(),
        }
    }
}

/// Structured result of one probe, merged into the signal bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeOutput {
    /// Services confirmed unhealthy vs. checked and fine
    Health {
        affected: Vec<String>,
        healthy: Vec<String>,
    },
    /// Current values keyed `<service>.<metric>`
    Metrics { values: BTreeMap<String, f64> },
    /// Recent log lines or patterns, `<service>: <message>`
    Logs { lines: Vec<String> },
    /// Firing alerts, `<service>: <alert name>`
    Alerts { alerts: Vec<String> },
}

/// A named source of environment evidence.
///
/// Any error is treated the same as a timeout: the probe is recorded as
/// unavailable and the rest of the bundle is unaffected. Implementations must be
/// safe to abandon mid-flight.
///
/// `run` executes on a runtime worker and must not block it. Blocking work
/// belongs in [`FnProbe`] or behind `tokio::task::spawn_blocking`.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn run(&self, request: &ProbeRequest) -> anyhow::Result<ProbeOutput>;
}

/// Adapter turning a synchronous closure into a [`Probe`].
///
/// The closure runs on the blocking pool, so a slow or stuck closure cannot
/// hold the gather deadline hostage. An abandoned call keeps its blocking
/// thread until the closure returns.
pub struct FnProbe<F> {
    f: Arc<F>,
}

impl<F> FnProbe<F>
where
    F: Fn(&ProbeRequest) -> anyhow::Result<ProbeOutput> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> Probe for FnProbe<F>
where
    F: Fn(&ProbeRequest) -> anyhow::Result<ProbeOutput> + Send + Sync + 'static,
{
    async fn run(&self, request: &ProbeRequest) -> anyhow::Result<ProbeOutput> {
        let f = Arc::clone(&self.f);
        let request = request.clone();
        tokio::task::spawn_blocking(move || f(&request))
            .await
            .map_err(|err| anyhow::anyhow!("probe closure did not finish: {err}"))?
    }
}

/// Capability map from probe name to implementation.
///
/// Iteration is in name order, which fixes the order probe outputs are merged in.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: BTreeMap<String, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, probe: impl Probe + 'static) -> Result<()> {
        self.register_shared(name, Arc::new(probe))
    }

    pub fn register_shared(&mut self, name: impl Into<String>, probe: Arc<dyn Probe>) -> Result<()> {
        let name = name.into();
        if self.probes.contains_key(&name) {
            return Err(GatherError::DuplicateProbe(name));
        }
        self.probes.insert(name, probe);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Probe>> {
        self.probes
            .get(name)
            .cloned()
            .ok_or_else(|| GatherError::UnknownProbe(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn Probe>> {
        self.probes
            .remove(name)
            .ok_or_else(|| GatherError::UnknownProbe(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.probes.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Probe>)> {
        self.probes.iter().map(|(name, probe)| (name.as_str(), probe))
    }
}

impl fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("probes", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> FnProbe<impl Fn(&ProbeRequest) -> anyhow::Result<ProbeOutput> + Send + Sync + 'static> {
        FnProbe::new(|_req: &ProbeRequest| Ok(ProbeOutput::Logs { lines: Vec::new() }))
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ProbeRegistry::new();
        registry.register(LOGS_PROBE, noop()).unwrap();
        assert!(matches!(
            registry.register(LOGS_PROBE, noop()),
            Err(GatherError::DuplicateProbe(name)) if name == "logs"
        ));
    }

    #[test]
    fn unknown_names_fail_loudly() {
        let mut registry = ProbeRegistry::new();
        registry.register(HEALTH_PROBE, noop()).unwrap();
        assert!(registry.get(HEALTH_PROBE).is_ok());
        assert!(matches!(
            registry.get("traces"),
            Err(GatherError::UnknownProbe(name)) if name == "traces"
        ));
        assert!(registry.remove("traces").is_err());
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ProbeRegistry::new();
        for name in [METRICS_PROBE, ALERTS_PROBE, LOGS_PROBE, HEALTH_PROBE] {
            registry.register(name, noop()).unwrap();
        }
        assert_eq!(registry.names(), vec!["alerts", "health", "logs", "metrics"]);
        assert_eq!(format!("{registry:?}"), r#"ProbeRegistry { probes: ["alerts", "health", "logs", "metrics"] }"#);
    }
}
