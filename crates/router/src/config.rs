use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};
use sop_catalog::CatalogConfig;
use sop_gather::GatherConfig;
use sop_match::{MatchWeights, SelectionThresholds};
use std::path::Path;

/// Everything a [`crate::SopRouter`] can be tuned with.
///
/// Loaded from TOML; every section and field is optional and falls back to
/// its default. Unknown keys are rejected.
///
/// ```toml
/// [weights]
/// service = 0.4
///
/// [thresholds]
/// accept = 0.6
///
/// [gather]
/// budget_ms = 5000
/// concurrency = 4
///
/// [catalog]
/// path = "ops/catalog.json"
/// cache_ttl_secs = 60
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub weights: MatchWeights,
    pub thresholds: SelectionThresholds,
    pub gather: GatherConfig,
    pub catalog: CatalogConfig,
}

impl RouterConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| RouterError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            RouterError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            RouterError::Config(message) => {
                RouterError::Config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.gather.validate()?;
        self.catalog.validate().map_err(RouterError::Config)?;
        Ok(())
    }
}
