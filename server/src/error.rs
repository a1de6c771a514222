//! This module provides the [Error] type returned by every storage-backed operation in this crate.

use {http::status::StatusCode, thiserror::Error};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a catalog, tagging, media, or search operation
///
/// Whenever one of these is returned from a mutating operation, none of that operation's changes were committed.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced media item, tag, or media/tag link does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// A unique key (tag name or media content hash) is already taken
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The caller supplied a structurally invalid value
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The underlying transaction could not be completed
    #[error("transaction failed: {0}")]
    TransactionFailed(#[source] sqlx::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ConstraintViolation(_) => StatusCode::CONFLICT,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::TransactionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(e) = &error {
            if e.is_unique_violation() {
                return Error::ConstraintViolation(e.message().to_owned());
            }
        }

        Error::TransactionFailed(error)
    }
}

/// Return true if `error` is a unique constraint violation reported by the store.
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(e) if e.is_unique_violation())
}
