//! # SOP Catalog
//!
//! Storage for standard operating procedures: the matching criteria used to
//! pick a procedure for an operational query, and the workflow steps a caller
//! follows afterwards.
//!
//! ## Consistency
//!
//! ```text
//! readers ──> RwLock<Arc<CatalogSnapshot>> ──(fresh?)──> snapshot
//!                      ▲                        │ stale
//!                      │ publish (pointer swap) ▼
//! writers ──> Mutex ──> backend.load ─> apply ─> backend.persist
//! ```
//!
//! - Reads inside the TTL never touch the backend.
//! - Writes publish a new snapshot immediately, so a read after a write sees it.
//! - A failed write leaves the previously published snapshot in place.
//!
//! ## Example
//!
//! ```rust
//! use sop_catalog::{CatalogStore, MemoryBackend, Procedure};
//! use std::time::Duration;
//!
//! let store = CatalogStore::new(MemoryBackend::new(), Duration::from_secs(300));
//! let lag = Procedure::new("consumer-lag", "Consumer lag", vec!["consumer lag".into()])
//!     .with_step("Check lag metrics", &["query_msk_metrics"]);
//! store.put(lag).unwrap();
//! assert_eq!(store.get("consumer-lag").unwrap().workflow_steps.len(), 1);
//! ```

mod backend;
mod config;
mod error;
mod model;
mod samples;
mod store;
mod validate;

pub use backend::{CatalogBackend, JsonFileBackend, MemoryBackend};
pub use config::{CatalogConfig, DEFAULT_CACHE_TTL_SECS, DEFAULT_CATALOG_PATH};
pub use error::{CatalogError, Result};
pub use model::{
    Applicability, CommonMistake, ConfidenceBooster, Exclusion, Procedure, WorkflowStep,
};
pub use samples::sample_procedures;
pub use store::{CatalogSnapshot, CatalogStats, CatalogStore, ImportReport, PutOutcome};
pub use validate::{validate_batch, validate_procedure};
