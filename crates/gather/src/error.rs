use thiserror::Error;

/// Result type for gathering setup
pub type Result<T> = std::result::Result<T, GatherError>;

/// Errors raised while configuring a gatherer.
///
/// Probe failures are not errors: they are recorded in the bundle's
/// probe reports and gathering carries on without them.
#[derive(Error, Debug)]
pub enum GatherError {
    /// Lookup of a probe name that was never registered
    #[error("Unknown probe: {0}")]
    UnknownProbe(String),

    /// A second probe registered under an existing name
    #[error("Probe already registered: {0}")]
    DuplicateProbe(String),

    /// Rejected configuration value
    #[error("Invalid gather configuration: {0}")]
    InvalidConfig(String),
}
