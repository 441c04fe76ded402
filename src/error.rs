use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed input or a uniqueness violation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The entity is absent or belongs to another organization.
    #[error("{0} not found")]
    NotFound(String),

    /// A reparent would make a node its own ancestor.
    #[error("cycle detected: {0}")]
    Cycle(String),

    /// Lost a race against a concurrent writer.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl Error {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Error::NotFound(format!("{entity} '{id}'"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
