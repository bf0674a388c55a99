//! Error types for the FlowDB runtime.
//!
//! All public APIs return `FlowResult<T>`; library code does not panic.
//! Store-level failures from SQLite pass through untouched in [`FlowError::Store`].

use thiserror::Error;

/// Unified error type for all FlowDB operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Table definition or adapter wiring is inconsistent (missing primary key,
    /// two autoincrement columns, INSERT value/column count mismatch, ...)
    #[error("configuration error on '{table}': {message}")]
    Configuration { table: String, message: String },

    /// Identity predicate requested for a model whose primary key is null
    #[error("primary key '{column}' of table '{table}' cannot be null")]
    PrimaryKeyCannotBeNull { table: String, column: String },

    /// A statement was used in a way its base does not support
    #[error("statement misuse on {statement}: {message}")]
    StatementMisuse { statement: String, message: String },

    /// Mutation attempted on a view or query model
    #[error("model '{model}' is read-only and cannot be saved, inserted, updated or deleted")]
    ReadOnlyModel { model: String },

    /// Empty-param substitution received the wrong number of values
    #[error("expected {expected} values for empty params, got {actual}")]
    ParamCountMismatch { expected: usize, actual: usize },

    /// Empty-param substitution on a group that also carries resolved values
    #[error("cannot mix empty params and resolved values in one condition group")]
    MixedParams,

    /// No adapter registered for the requested model type
    #[error("no adapter registered for '{0}'")]
    MissingAdapter(String),

    /// Caching helpers called on a table generated without caching support
    #[error("caching is not enabled for table '{table}'")]
    CachingNotEnabled { table: String },

    /// SQLite error (constraint violations, syntax errors, ...)
    #[error("store error: {source}")]
    Store {
        #[from]
        source: rusqlite::Error,
    },

    /// A cursor value could not be read as the requested type
    #[error("cannot read column '{column}' as {expected}: found {actual}")]
    Conversion {
        column: String,
        expected: String,
        actual: String,
    },

    /// Requested cursor column does not exist
    #[error("column '{0}' not found in cursor")]
    ColumnNotFound(String),

    /// Cursor is not positioned on a row
    #[error("cursor is not positioned on a row")]
    CursorOutOfBounds,

    /// Configuration (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A transaction failed on a queue worker, which stopped
    #[error("worker of queue '{queue}' crashed: {message}")]
    WorkerCrashed { queue: String, message: String },

    /// The queue has been shut down and no longer accepts work
    #[error("queue '{0}' has been shut down")]
    QueueShutdown(String),
}

/// Result type alias for all FlowDB operations.
pub type FlowResult<T> = Result<T, FlowError>;

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}

impl FlowError {
    pub(crate) fn configuration(table: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::Configuration {
            table: table.into(),
            message: message.into(),
        }
    }

    pub(crate) fn misuse(statement: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::StatementMisuse {
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// True for constraint violations reported by the store (NOT NULL, UNIQUE, ...)
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            FlowError::Store {
                source: rusqlite::Error::SqliteFailure(err, _)
            } if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
