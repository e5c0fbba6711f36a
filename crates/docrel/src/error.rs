//! Error types for the mapping engine.
//!
//! The taxonomy is a closed set: transient serialization conflicts
//! ([`DocrelError::Rollback`]), caller mistakes ([`UserError`]), a persistent
//! meta-schema that does not match its reference layout
//! ([`DocrelError::InvalidDatabase`]), and everything fatal to the
//! transaction ([`DocrelError::System`]).

use thiserror::Error;

/// Statement context an error was raised under, used by [`ErrorHandler`]
/// when translating backend exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Insert,
    Delete,
    Read,
    Ddl,
    Unknown,
}

/// Errors caused by the caller rather than the engine or the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    /// The named database does not exist in the snapshot.
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// The named collection does not exist in the database.
    #[error("Collection not found: {db}.{collection}")]
    CollectionNotFound { db: String, collection: String },

    /// An empty attribute reference where a non-empty one is required.
    #[error("The empty attribute reference is not valid here")]
    InvalidAttributeReference,

    /// The backend refuses to map the given scalar type.
    #[error("The backend cannot index values of type {0}")]
    UnindexableType(&'static str),
}

/// Main error type for mapping-engine operations.
#[derive(Error, Debug)]
pub enum DocrelError {
    /// The backend signalled a serialization failure or deadlock. The whole
    /// transaction may be retried by the caller; this layer never retries.
    #[error("Transaction must be rolled back and retried: {0}")]
    Rollback(String),

    /// A caller mistake, surfaced to the application layer.
    #[error(transparent)]
    User(#[from] UserError),

    /// The persistent meta-schema does not match the expected layout.
    /// Fatal for the process.
    #[error("Invalid database: {0}")]
    InvalidDatabase(String),

    /// The identifier factory exhausted its retry budget without producing a
    /// unique physical identifier.
    #[error("Cannot allocate a unique identifier for '{logical}' in scope '{scope}'")]
    CatalogConflict { scope: String, logical: String },

    /// Configuration error (invalid YAML, out-of-range values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend I/O failure, missing resource, or violated internal
    /// assertion. Fatal for the transaction.
    #[error("System error: {0}")]
    System(String),

    /// IO error (config file loading).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DocrelError {
    /// Whether the caller may retry the enclosing transaction.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, DocrelError::Rollback(_))
    }
}

/// A raw backend exception before translation: the driver message plus the
/// SQLSTATE, when the backend reported one.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub message: String,
    pub sqlstate: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>, sqlstate: Option<String>) -> Self {
        Self {
            message: message.into(),
            sqlstate,
        }
    }
}

impl From<tokio_postgres::Error> for BackendError {
    fn from(err: tokio_postgres::Error) -> Self {
        let sqlstate = err.code().map(|c| c.code().to_string());
        BackendError::new(err.to_string(), sqlstate)
    }
}

/// Translates backend exceptions into the canonical taxonomy.
///
/// Each dialect provides one; the write interface and schema updater tag
/// every statement they execute with a [`Context`] so the handler can decide
/// which SQLSTATEs are retriable in that position.
pub trait ErrorHandler: Send + Sync {
    /// Map a backend error raised in the given context.
    fn handle(&self, context: Context, error: BackendError) -> DocrelError;
}

/// Result type alias for mapping-engine operations.
pub type Result<T> = std::result::Result<T, DocrelError>;
