use crate::config::RouterConfig;
use crate::error::Result;
use crate::response::RoutingResponse;
use sop_catalog::{CatalogBackend, CatalogSnapshot, CatalogStore, JsonFileBackend};
use sop_gather::{GatherConfig, Gatherer, ProbeRegistry, SignalBundle, SuppliedContext};
use sop_match::Matcher;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Query in, procedure out: gathers context, scores the catalog, selects.
///
/// The gatherer's service vocabulary is extended with every service filter in
/// the catalog, and rebuilt whenever the catalog publishes a new revision.
pub struct SopRouter<B = JsonFileBackend> {
    catalog: Arc<CatalogStore<B>>,
    probes: ProbeRegistry,
    gather_config: GatherConfig,
    matcher: Matcher,
    gatherer: RwLock<Option<(u64, Arc<Gatherer>)>>,
}

impl<B: CatalogBackend> SopRouter<B> {
    pub fn new(
        catalog: Arc<CatalogStore<B>>,
        probes: ProbeRegistry,
        config: &RouterConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog,
            probes,
            gather_config: config.gather.clone(),
            matcher: Matcher::new(config.weights, config.thresholds)?,
            gatherer: RwLock::new(None),
        })
    }

    pub fn catalog(&self) -> &CatalogStore<B> {
        &self.catalog
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Route within the configured gathering budget.
    pub async fn route(&self, query: &str) -> Result<RoutingResponse> {
        self.route_within(query, self.gather_config.budget()).await
    }

    pub async fn route_within(&self, query: &str, budget: Duration) -> Result<RoutingResponse> {
        self.route_with_supplied(query, SuppliedContext::default(), budget)
            .await
    }

    /// Gather, then merge evidence the caller already holds before matching.
    pub async fn route_with_supplied(
        &self,
        query: &str,
        supplied: SuppliedContext,
        budget: Duration,
    ) -> Result<RoutingResponse> {
        let snapshot = self.catalog.snapshot()?;
        let gatherer = self.gatherer_for(&snapshot)?;
        let bundle = gatherer
            .gather_within(query, budget)
            .await
            .with_supplied(supplied);
        Ok(self.respond(&bundle, &snapshot))
    }

    /// Match a bundle assembled elsewhere; no probes run.
    pub fn route_with_context(&self, bundle: &SignalBundle) -> Result<RoutingResponse> {
        let snapshot = self.catalog.snapshot()?;
        Ok(self.respond(bundle, &snapshot))
    }

    fn respond(&self, bundle: &SignalBundle, snapshot: &CatalogSnapshot) -> RoutingResponse {
        let evaluation = self.matcher.evaluate(bundle, snapshot.procedures());
        match evaluation.outcome.primary() {
            Some(primary) => log::info!(
                "Routed query to {} ({}, score {:.3})",
                primary.procedure_id,
                evaluation.outcome.kind(),
                primary.score
            ),
            None => log::info!("No procedure matched the query"),
        }
        if !bundle.is_complete() {
            log::info!(
                "Decision made without probe(s): {}",
                bundle.unavailable_probes().join(", ")
            );
        }
        RoutingResponse::render(bundle, evaluation, snapshot)
    }

    fn gatherer_for(&self, snapshot: &CatalogSnapshot) -> Result<Arc<Gatherer>> {
        let revision = snapshot.revision();
        {
            let cached = self.gatherer.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((built_for, gatherer)) = cached.as_ref() {
                if *built_for == revision {
                    return Ok(Arc::clone(gatherer));
                }
            }
        }

        let mut config = self.gather_config.clone();
        config.vocabulary.extend_services(
            snapshot
                .procedures()
                .iter()
                .flat_map(|p| &p.applicability.service_filters),
        );
        let gatherer = Arc::new(Gatherer::new(config, self.probes.clone())?);
        log::debug!(
            "Built gatherer for catalog revision {revision} ({} known service(s))",
            gatherer.config().vocabulary.services.len()
        );
        *self.gatherer.write().unwrap_or_else(PoisonError::into_inner) =
            Some((revision, Arc::clone(&gatherer)));
        Ok(gatherer)
    }
}
