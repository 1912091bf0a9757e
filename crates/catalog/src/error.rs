use thiserror::Error;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while reading or mutating the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A procedure record failed schema validation on ingest
    #[error("Invalid procedure '{id}': {reason}")]
    Validation { id: String, reason: String },

    /// Lookup by an unknown id
    #[error("Procedure not found: {0}")]
    NotFound(String),

    /// Create with an id that is already taken
    #[error("Procedure already exists: {0}")]
    AlreadyExists(String),

    /// IO error from a file-backed catalog
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed catalog payload
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl CatalogError {
    /// Create a validation error for the record with the given id
    pub fn validation(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
