use anyhow::{Context as AnyhowContext, Result};
use serde_json::Value;
use sop_catalog::CatalogStore;
use sop_gather::SuppliedContext;
use sop_router::{Environment, RouterConfig, SopRouter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inputs of `sop-router match`.
#[derive(Debug, Clone, Default)]
pub struct MatchRequest {
    pub query: String,
    pub environment: Option<PathBuf>,
    pub context: Option<PathBuf>,
    pub budget_ms: Option<u64>,
}

pub async fn run_match(request: MatchRequest, mut config: RouterConfig) -> Result<Value> {
    if request.query.trim().is_empty() {
        anyhow::bail!(
            "Query is empty. Describe the symptom, e.g. \"high consumer lag in payment-consumer\"."
        );
    }
    if let Some(budget_ms) = request.budget_ms {
        config.gather.budget_ms = budget_ms;
    }

    let environment = match &request.environment {
        Some(path) => Environment::load(path)?,
        None => Environment::default(),
    };
    let supplied = match &request.context {
        Some(path) => load_supplied(path)?,
        None => SuppliedContext::default(),
    };

    let catalog = Arc::new(CatalogStore::from_config(&config.catalog));
    if catalog.list()?.is_empty() {
        log::warn!(
            "Catalog {} is empty; run `sop-router catalog init` to seed it",
            config.catalog.path.display()
        );
    }
    let router = SopRouter::new(catalog, environment.into_probes()?, &config)?;
    let response = router
        .route_with_supplied(&request.query, supplied, config.gather.budget())
        .await?;
    Ok(serde_json::to_value(response)?)
}

fn load_supplied(path: &Path) -> Result<SuppliedContext> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid context file {}", path.display()))
}
