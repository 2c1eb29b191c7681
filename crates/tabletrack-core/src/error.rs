//! Error types for core operations.
//!
//! Every operation returns either a success value or exactly one of these
//! variants. Expected business outcomes ("table busy", "already returned")
//! are `Conflict`, never panics or stringly-typed exceptions. The core does
//! not retry and does not decide HTTP status codes.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core operation errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed, missing, or out-of-range input. Caller's fault; retrying
    /// the same request will not help.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation would violate a state invariant: table busy,
    /// organization banned, duplicate active checkout, already returned,
    /// or a lock wait that ran out.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected database failure.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl CoreError {
    /// Check if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    /// Check if this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }

    /// Check if this is a conflict error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}

// PostgreSQL SQLSTATE codes that represent contention rather than failure.
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for CoreError {
    /// Classify storage errors into the core taxonomy.
    ///
    /// Lock-wait exhaustion, deadlock aborts, and serialization failures
    /// surface as `Conflict` with a retry-inviting message; violations of
    /// the one-active-checkout unique indexes surface as the conflict they
    /// guard against. Everything else is an unexpected `Database` error.
    fn from(err: sqlx::Error) -> Self {
        let conflict = err.as_database_error().and_then(|db_err| {
            match db_err.code().as_deref() {
                Some(LOCK_NOT_AVAILABLE) | Some(DEADLOCK_DETECTED)
                | Some(SERIALIZATION_FAILURE) => Some(
                    "The record is locked by another operation; please retry".to_string(),
                ),
                Some(UNIQUE_VIOLATION) => Some(match db_err.constraint().unwrap_or_default() {
                    "checkouts_one_active_per_organization" => {
                        "Organization already has an active checkout".to_string()
                    }
                    "checkouts_one_active_per_table" => {
                        "Table is already checked out".to_string()
                    }
                    "organizations_official_name_key" => {
                        "Organization with this name already exists".to_string()
                    }
                    "tables_table_number_key" => {
                        "Table with this number already exists".to_string()
                    }
                    _ => format!("Duplicate record: {}", db_err.message()),
                }),
                _ => None,
            }
        });

        match conflict {
            Some(message) => CoreError::Conflict(message),
            None => CoreError::Database(err),
        }
    }
}
