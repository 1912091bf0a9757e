use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CATALOG_PATH: &str = ".sop-router/catalog.json";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Where the catalog lives and how long reads may be served from cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// JSON file holding the procedure records
    pub path: PathBuf,

    /// Maximum age of the cached snapshot before a read reloads it
    pub cache_ttl_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CATALOG_PATH),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CatalogConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("catalog.path must not be empty".to_string());
        }
        Ok(())
    }
}
