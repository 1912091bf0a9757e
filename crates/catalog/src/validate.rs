use crate::error::{CatalogError, Result};
use crate::model::Procedure;
use std::collections::HashSet;

/// Check a single record against the ingest schema.
///
/// Rejects missing identity fields, an empty or blank keyword list,
/// non-contiguous step numbering, and boost amounts outside `[0, 1]`.
pub fn validate_procedure(proc: &Procedure) -> Result<()> {
    let id = proc.id.trim();
    if id.is_empty() {
        return Err(CatalogError::validation("<missing>", "id must not be empty"));
    }
    if id != proc.id {
        return Err(CatalogError::validation(
            &proc.id,
            "id must not have leading or trailing whitespace",
        ));
    }
    if proc.name.trim().is_empty() {
        return Err(CatalogError::validation(id, "name must not be empty"));
    }
    if proc.trigger_keywords.is_empty() {
        return Err(CatalogError::validation(
            id,
            "trigger_keywords must contain at least one keyword",
        ));
    }
    if let Some(pos) = proc
        .trigger_keywords
        .iter()
        .position(|k| k.trim().is_empty())
    {
        return Err(CatalogError::validation(
            id,
            format!("trigger_keywords[{pos}] is blank"),
        ));
    }

    for (expected, step) in (1u32..).zip(&proc.workflow_steps) {
        if step.step_number != expected {
            return Err(CatalogError::validation(
                id,
                format!(
                    "workflow step numbers must be contiguous from 1: expected {expected}, found {}",
                    step.step_number
                ),
            ));
        }
        if step.title.trim().is_empty() {
            return Err(CatalogError::validation(
                id,
                format!("workflow step {expected} has an empty title"),
            ));
        }
    }

    for (pos, booster) in proc.confidence_boosters.iter().enumerate() {
        if !booster.boost_amount.is_finite() || !(0.0..=1.0).contains(&booster.boost_amount) {
            return Err(CatalogError::validation(
                id,
                format!(
                    "confidence_boosters[{pos}].boost_amount must be within [0, 1], got {}",
                    booster.boost_amount
                ),
            ));
        }
        if booster.condition.trim().is_empty() {
            return Err(CatalogError::validation(
                id,
                format!("confidence_boosters[{pos}].condition is blank"),
            ));
        }
    }

    Ok(())
}

/// Validate a batch of records, including id uniqueness within the batch.
pub fn validate_batch(procs: &[Procedure]) -> Result<()> {
    let mut seen = HashSet::with_capacity(procs.len());
    for proc in procs {
        validate_procedure(proc)?;
        if !seen.insert(proc.id.as_str()) {
            return Err(CatalogError::validation(
                &proc.id,
                "duplicate id within the same batch",
            ));
        }
    }
    Ok(())
}
