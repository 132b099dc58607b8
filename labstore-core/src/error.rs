//! Error types and result types for access-layer operations.
//!
//! Every backend failure is translated into a [`DbError`] before it leaves the
//! layer, so callers can match on the error kind without knowing which store
//! produced it. Use [`DbResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Failures of the store connection itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// A data operation was attempted before [`Database::initialize`](crate::database::Database::initialize)
    /// completed, or after [`Database::shutdown`](crate::database::Database::shutdown).
    #[error("Database is not ready!")]
    NotReady,
    /// The store could not be reached or refused the connection.
    #[error("{}", describe(code, message))]
    Failed {
        /// The backend's native error code, when it reports one.
        code: Option<i32>,
        /// The backend's error message.
        message: String,
    },
}

/// The uniform error kind of the access layer.
///
/// No operation returns a backend-native error; each backend translates its failures into
/// one of these variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// The store is unreachable, rejected authentication, or is not initialized yet.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    /// A query or write failed at the backend.
    #[error("Operation error: {}", describe(code, message))]
    Operation {
        /// The backend's native error code, when it reports one.
        code: Option<i32>,
        /// The backend's error message.
        message: String,
    },
    /// A payload could not be converted to or from the store's document format.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The layer was configured with invalid or missing settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A specialized `Result` type for access-layer operations.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Builds a [`ConnectionError::Failed`] error.
    pub fn connection(code: Option<i32>, message: impl Into<String>) -> Self {
        DbError::Connection(ConnectionError::Failed { code, message: message.into() })
    }

    /// Builds an [`DbError::Operation`] error.
    pub fn operation(code: Option<i32>, message: impl Into<String>) -> Self {
        DbError::Operation { code, message: message.into() }
    }

    /// Returns `true` for connection failures, including the not-ready state.
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }

    /// Returns `true` if the error reports an operation attempted before initialization.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, DbError::Connection(ConnectionError::NotReady))
    }

    /// Returns the backend's native error code, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            DbError::Connection(ConnectionError::Failed { code, .. }) => *code,
            DbError::Operation { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe(code: &Option<i32>, message: &str) -> String {
    match code {
        Some(code) => format!("[{code}] {message}"),
        None => message.to_string(),
    }
}

impl From<BsonError> for DbError {
    fn from(err: BsonError) -> Self {
        DbError::Serialization(err.to_string())
    }
}
