//! # SOP Gather
//!
//! Turns a free-text operational query into a [`SignalBundle`]: services and
//! symptoms named in the query, plus whatever the registered probes (health,
//! metrics, logs, alerts) report before a hard deadline.
//!
//! ## Guarantees
//!
//! - Gathering returns within the budget plus one scheduling quantum, however
//!   many probes hang.
//! - A failing or timed-out probe is recorded in [`SignalBundle::probes`] and
//!   contributes nothing; it never fails the call.
//! - At most `concurrency` probes run at once.
//! - Bundle contents do not depend on probe completion order.
//!
//! ## Example
//!
//! ```rust
//! use sop_gather::{FnProbe, GatherConfig, Gatherer, ProbeOutput, ProbeRegistry, ProbeRequest};
//!
//! let mut probes = ProbeRegistry::new();
//! probes
//!     .register(
//!         "health",
//!         FnProbe::new(|req: &ProbeRequest| {
//!             Ok(ProbeOutput::Health {
//!                 affected: req.services.clone(),
//!                 healthy: Vec::new(),
//!             })
//!         }),
//!     )
//!     .unwrap();
//!
//! let gatherer = Gatherer::new(GatherConfig::default(), probes).unwrap();
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let bundle = runtime.block_on(gatherer.gather("consumer lag in payment-consumer"));
//! assert_eq!(bundle.affected_services, vec!["payment", "payment-consumer"]);
//! ```

mod bundle;
mod config;
mod error;
mod extract;
mod gatherer;
mod probe;

pub use bundle::{ProbeReport, ProbeStatus, SignalBundle, SuppliedContext};
pub use config::{
    GatherConfig, Vocabulary, DEFAULT_BUDGET_MS, DEFAULT_CONCURRENCY, FALLBACK_METRICS,
};
pub use error::{GatherError, Result};
pub use extract::{normalize_query, QueryExtractor, QuerySignals};
pub use gatherer::Gatherer;
pub use probe::{
    FnProbe, Probe, ProbeOutput, ProbeRegistry, ProbeRequest, ALERTS_PROBE, HEALTH_PROBE,
    LOGS_PROBE, METRICS_PROBE,
};
