use crate::bundle::{ProbeReport, ProbeStatus, SignalBundle};
use crate::config::GatherConfig;
use crate::error::Result;
use crate::extract::QueryExtractor;
use crate::probe::{Probe, ProbeOutput, ProbeRegistry, ProbeRequest};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

/// Longest budget honoured; larger requests are clamped.
const MAX_BUDGET: Duration = Duration::from_secs(3600);

/// Runs every registered probe concurrently under a hard deadline and folds
/// their outputs into a [`SignalBundle`].
///
/// Probes still running when the budget elapses are abandoned: their tasks
/// are detached, never awaited again, and recorded as timed out.
#[derive(Debug)]
pub struct Gatherer {
    config: GatherConfig,
    extractor: QueryExtractor,
    probes: ProbeRegistry,
}

struct ProbeRun {
    report: ProbeReport,
    output: Option<ProbeOutput>,
}

impl Gatherer {
    pub fn new(config: GatherConfig, probes: ProbeRegistry) -> Result<Self> {
        config.validate()?;
        let extractor = QueryExtractor::new(config.vocabulary.clone())?;
        Ok(Self {
            config,
            extractor,
            probes,
        })
    }

    pub fn config(&self) -> &GatherConfig {
        &self.config
    }

    pub fn extractor(&self) -> &QueryExtractor {
        &self.extractor
    }

    pub fn probes(&self) -> &ProbeRegistry {
        &self.probes
    }

    /// Gather within the configured budget.
    pub async fn gather(&self, query: &str) -> SignalBundle {
        self.gather_within(query, self.config.budget()).await
    }

    /// Gather within `budget`, overriding the configured one.
    pub async fn gather_within(&self, query: &str, budget: Duration) -> SignalBundle {
        let budget = budget.min(MAX_BUDGET);
        let started = Instant::now();
        let deadline = started + budget;
        let started_at_unix_ms = unix_ms_now();

        let signals = self.extractor.extract(query);
        let mut bundle = SignalBundle::from_signals(query, &signals);
        bundle.started_at_unix_ms = started_at_unix_ms;

        let request = Arc::new(ProbeRequest::new(query, &signals));
        let pool = Arc::new(Semaphore::new(self.config.concurrency));
        let probe_timeout = self.config.probe_timeout();

        let mut tasks = JoinSet::new();
        for (name, probe) in self.probes.iter() {
            tasks.spawn(run_probe(
                name.to_string(),
                Arc::clone(probe),
                Arc::clone(&request),
                Arc::clone(&pool),
                deadline,
                probe_timeout,
            ));
        }

        let mut finished: BTreeMap<String, ProbeRun> = BTreeMap::new();
        let mut deadline_hit = false;
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(mut run))) => {
                    if run.output.is_some() && Instant::now() > deadline {
                        run.report.status = ProbeStatus::TimedOut;
                        run.report.detail = Some("finished after the gather deadline".into());
                        run.output = None;
                    }
                    finished.insert(run.report.name.clone(), run);
                }
                Ok(Some(Err(err))) => log::warn!("Probe task ended abnormally: {err}"),
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    break;
                }
            }
        }
        if deadline_hit && !tasks.is_empty() {
            log::warn!(
                "Gather budget of {}ms exhausted; abandoning {} probe(s)",
                budget.as_millis(),
                tasks.len()
            );
            tasks.detach_all();
        }

        let budget_ms = duration_ms(budget);
        for (name, _) in self.probes.iter() {
            let run = finished.remove(name).unwrap_or_else(|| ProbeRun {
                report: ProbeReport {
                    name: name.to_string(),
                    status: if deadline_hit {
                        ProbeStatus::TimedOut
                    } else {
                        ProbeStatus::Failed
                    },
                    elapsed_ms: budget_ms,
                    detail: (!deadline_hit).then(|| "probe task panicked".to_string()),
                },
                output: None,
            });
            match run.report.status {
                ProbeStatus::Completed => {}
                ProbeStatus::TimedOut => log::warn!(
                    "Probe {name} unavailable: timed out after {}ms",
                    run.report.elapsed_ms
                ),
                ProbeStatus::Failed => log::warn!(
                    "Probe {name} unavailable: {}",
                    run.report.detail.as_deref().unwrap_or("failed")
                ),
            }
            if let Some(output) = run.output {
                bundle.merge(output);
            }
            bundle.probes.push(run.report);
        }
        bundle.finalize();
        bundle.elapsed_ms = duration_ms(started.elapsed());

        log::info!(
            "Gathered context in {}ms: {} probe(s) completed, {} unavailable",
            bundle.elapsed_ms,
            bundle.available_probes().len(),
            bundle.unavailable_probes().len()
        );
        bundle
    }
}

async fn run_probe(
    name: String,
    probe: Arc<dyn Probe>,
    request: Arc<ProbeRequest>,
    pool: Arc<Semaphore>,
    deadline: Instant,
    probe_timeout: Option<Duration>,
) -> ProbeRun {
    let queued = Instant::now();
    let finish = |status: ProbeStatus, output: Option<ProbeOutput>, detail: Option<String>| {
        ProbeRun {
            report: ProbeReport {
                name: name.clone(),
                status,
                elapsed_ms: duration_ms(queued.elapsed()),
                detail,
            },
            output,
        }
    };

    let permit = match timeout_at(deadline, pool.acquire_owned()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return finish(ProbeStatus::Failed, None, Some("probe pool closed".into())),
        Err(_) => return finish(ProbeStatus::TimedOut, None, None),
    };

    let cap = probe_timeout
        .and_then(|limit| Instant::now().checked_add(limit))
        .map_or(deadline, |cap| cap.min(deadline));
    let result = timeout_at(cap, probe.run(&request)).await;
    drop(permit);

    match result {
        Ok(Ok(output)) => finish(ProbeStatus::Completed, Some(output), None),
        Ok(Err(err)) => finish(ProbeStatus::Failed, None, Some(format!("{err:#}"))),
        Err(_) => finish(ProbeStatus::TimedOut, None, None),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, duration_ms)
}
