use thiserror::Error;

/// Result type for matcher setup
pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors raised while configuring a matcher.
///
/// Scoring itself never fails; a query nothing fits is a
/// [`crate::SelectionOutcome::NoMatch`], not an error.
#[derive(Error, Debug)]
pub enum MatchError {
    /// Rejected weights or thresholds
    #[error("Invalid match configuration: {0}")]
    InvalidConfig(String),
}
