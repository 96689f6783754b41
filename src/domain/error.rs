use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Soft rejection: the item (or row) already exists.
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Text could not be salvaged by the encoding normaliser.
    #[error("Unrecoverable encoding: {0}")]
    Encoding(String),

    #[error("Model output could not be parsed: {0}")]
    ModelParse(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Logical error reported by an upstream provider (e.g. `rt_cd != "0"`).
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Config error: {0}")]
    Config(String),

    /// A scheduled job panicked or was cancelled.
    #[error("Job failed: {0}")]
    Job(String),
}

impl DomainError {
    /// Duplicates are an expected outcome of ingestion, not a failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DomainError::Duplicate(_))
    }
}

impl From<String> for DomainError {
    fn from(s: String) -> Self {
        DomainError::Database(s)
    }
}

impl From<&str> for DomainError {
    fn from(s: &str) -> Self {
        DomainError::InvalidInput(s.to_string())
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DomainError::Duplicate(e.to_string())
            }
            _ => DomainError::Database(e.to_string()),
        }
    }
}
