use anyhow::{Context as AnyhowContext, Result};
use serde::Serialize;
use serde_json::{json, Value};
use sop_catalog::{sample_procedures, CatalogConfig, CatalogStore, Procedure};
use std::path::Path;

/// One line of `catalog list` / `catalog search` output.
#[derive(Debug, Serialize)]
pub struct ProcedureSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub tags: Vec<String>,
    pub steps: usize,
}

impl From<&Procedure> for ProcedureSummary {
    fn from(procedure: &Procedure) -> Self {
        Self {
            id: procedure.id.clone(),
            name: procedure.name.clone(),
            version: procedure.version.clone(),
            tags: procedure.tags.clone(),
            steps: procedure.workflow_steps.len(),
        }
    }
}

fn listing<'a>(procedures: impl IntoIterator<Item = &'a Procedure>) -> Value {
    let procedures: Vec<ProcedureSummary> = procedures.into_iter().map(Into::into).collect();
    json!({ "count": procedures.len(), "procedures": procedures })
}

/// Seed the catalog with the built-in samples.
pub fn init(config: &CatalogConfig, force: bool) -> Result<Value> {
    let store = CatalogStore::from_config(config);
    let existing = store.list()?.len();
    if existing > 0 && !force {
        anyhow::bail!(
            "Catalog {} already holds {existing} procedure(s); pass --force to reseed it",
            config.path.display()
        );
    }
    let report = store
        .import(sample_procedures()?, true)
        .context("Failed to seed sample procedures")?;
    log::info!(
        "Seeded {} with {} sample procedure(s)",
        config.path.display(),
        report.imported()
    );
    Ok(json!({ "path": config.path, "report": report }))
}

pub fn list(config: &CatalogConfig) -> Result<Value> {
    let snapshot = CatalogStore::from_config(config).list()?;
    Ok(listing(snapshot.procedures()))
}

pub fn get(config: &CatalogConfig, id: &str) -> Result<Value> {
    let procedure = CatalogStore::from_config(config).get(id)?;
    Ok(serde_json::to_value(procedure)?)
}

pub fn delete(config: &CatalogConfig, id: &str) -> Result<Value> {
    let removed = CatalogStore::from_config(config).delete(id)?;
    Ok(json!({ "deleted": removed.id, "name": removed.name }))
}

/// Union of keyword and tag hits, in catalog order.
pub fn search(config: &CatalogConfig, keywords: &[String], tags: &[String]) -> Result<Value> {
    if keywords.is_empty() && tags.is_empty() {
        anyhow::bail!("Nothing to search for. Pass at least one --keyword or --tag.");
    }
    let store = CatalogStore::from_config(config);
    let mut hits: Vec<Procedure> = Vec::new();
    if !keywords.is_empty() {
        hits.extend(store.search_by_keywords(keywords)?);
    }
    if !tags.is_empty() {
        for procedure in store.search_by_tags(tags)? {
            if !hits.iter().any(|hit| hit.id == procedure.id) {
                hits.push(procedure);
            }
        }
    }
    let snapshot = store.list()?;
    let order = |p: &Procedure| {
        snapshot
            .procedures()
            .iter()
            .position(|q| q.id == p.id)
            .unwrap_or(usize::MAX)
    };
    hits.sort_by_key(order);
    Ok(listing(&hits))
}

pub fn import(config: &CatalogConfig, file: &Path, overwrite: bool) -> Result<Value> {
    let report = CatalogStore::from_config(config)
        .import_file(file, overwrite)
        .with_context(|| format!("Failed to import {}", file.display()))?;
    Ok(json!({ "file": file, "report": report }))
}

pub fn export(config: &CatalogConfig, file: &Path) -> Result<Value> {
    let exported = CatalogStore::from_config(config)
        .export_file(file)
        .with_context(|| format!("Failed to export to {}", file.display()))?;
    Ok(json!({ "file": file, "exported": exported }))
}

pub fn stats(config: &CatalogConfig) -> Result<Value> {
    let stats = CatalogStore::from_config(config).stats()?;
    Ok(serde_json::to_value(stats)?)
}
