//! # SOP Match
//!
//! Scores procedures against a [`sop_gather::SignalBundle`] and decides what
//! to do with the ranking.
//!
//! Five factors feed each score, every one in `[0, 1]`:
//!
//! | Factor  | Value |
//! |---------|-------|
//! | keyword | fraction of trigger keywords found in the query |
//! | service | 1 on an exact or prefix service hit, else the fraction of filters sharing a name segment |
//! | metric  | fraction of metric patterns present among gathered metrics |
//! | log     | fraction of log patterns found in gathered log lines |
//! | booster | satisfied booster amounts, summed and capped at 1 |
//!
//! Factors a procedure declares nothing for are left out of both the weighted
//! sum and its denominator. Exclusion is checked first and forces the score to 0.
//!
//! ```rust
//! use sop_catalog::Procedure;
//! use sop_gather::SignalBundle;
//! use sop_match::{Matcher, SelectionOutcome};
//!
//! let procedures = vec![Procedure::new("disk-full", "Disk full", vec!["disk full".into()])];
//! let bundle = SignalBundle {
//!     normalized_query: "disk full on order-db".into(),
//!     ..SignalBundle::default()
//! };
//!
//! let evaluation = Matcher::default().evaluate(&bundle, &procedures);
//! assert!(matches!(evaluation.outcome, SelectionOutcome::SingleMatch { .. }));
//! ```

mod config;
mod error;
mod matcher;
mod result;
mod scoring;
mod selection;

pub use config::{
    MatchWeights, SelectionThresholds, DEFAULT_ACCEPT, DEFAULT_CLOSENESS, DEFAULT_FLOOR,
    DEFAULT_MAX_ALTERNATIVES,
};
pub use error::{MatchError, Result};
pub use matcher::{Evaluation, Matcher};
pub use result::{
    ContextHighlights, ExclusionHit, ExclusionRule, Explanation, Factor, FactorScore,
    MatchResult, ScoreBreakdown,
};
pub use scoring::{find_matches, rank, score_procedure};
pub use selection::{disambiguation_question, select, SelectionOutcome};
