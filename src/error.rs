use thiserror::Error;

/// Error type for dbsql operations
#[derive(Debug, Error)]
pub enum DbSqlError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Field `{field}` of `{shape}` has type `{type_name}` with no SQL type mapping")]
    UnsupportedFieldType {
        shape: &'static str,
        field: &'static str,
        type_name: &'static str,
    },

    #[error("Query text was not set")]
    MissingCommandText,

    #[error("Query has already been executed or disposed")]
    QueryAlreadyDisposed,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Cannot convert {actual} into {expected}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown database provider: {0}")]
    UnknownProvider(String),
}

impl DbSqlError {
    /// Returns true for failures surfaced by the underlying driver
    /// (connection, command or cursor).
    pub fn is_driver_failure(&self) -> bool {
        matches!(
            self,
            DbSqlError::ConnectionFailed(_)
                | DbSqlError::QueryFailed(_)
                | DbSqlError::ColumnNotFound(_)
                | DbSqlError::TypeMismatch { .. }
        )
    }
}

/// Result type alias for dbsql operations
pub type Result<T> = std::result::Result<T, DbSqlError>;
