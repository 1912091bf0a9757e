//! # SOP Router
//!
//! Composition root tying the catalog, the gatherer and the matcher together.
//!
//! ```text
//! query ──> Gatherer (probes, hard deadline) ──> SignalBundle
//!                                                    │
//! CatalogStore ──> snapshot ──> Matcher ─────────────┘
//!                                  │
//!                                  ▼
//!                   SelectionOutcome ──> RoutingResponse
//! ```
//!
//! A slow or failing probe never fails a route; the response's context
//! summary lists which probes were unavailable.
//!
//! ## Example
//!
//! ```rust
//! use sop_catalog::{sample_procedures, CatalogStore, MemoryBackend};
//! use sop_router::{Environment, RouterConfig, RoutingStatus, SopRouter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let catalog = Arc::new(CatalogStore::new(
//!     MemoryBackend::with_records(sample_procedures().unwrap()),
//!     Duration::from_secs(300),
//! ));
//! let probes = Environment::default().into_probes().unwrap();
//! let router = SopRouter::new(catalog, probes, &RouterConfig::default()).unwrap();
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let response = runtime
//!     .block_on(router.route("logstash pipeline stuck with queue full"))
//!     .unwrap();
//! assert_eq!(response.status, RoutingStatus::Success);
//! ```

mod config;
mod environment;
mod error;
mod response;
mod router;

pub use config::RouterConfig;
pub use environment::{Environment, Health, ServiceState};
pub use error::{Result, RouterError};
pub use response::{Alternative, ContextSummary, MatchType, RoutingResponse, RoutingStatus};
pub use router::SopRouter;
