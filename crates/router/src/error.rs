use sop_catalog::CatalogError;
use sop_gather::GatherError;
use sop_match::MatchError;
use thiserror::Error;

/// Result type for routing
pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors from building a router or serving a query.
///
/// A query nothing matches is not an error; it renders as a `no_match`
/// response.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Gather(#[from] GatherError),

    #[error(transparent)]
    Match(#[from] MatchError),

    /// Unreadable or rejected configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unreadable or malformed environment fixture
    #[error("Environment fixture error: {0}")]
    Environment(String),
}
