//! Connection pool construction.
//!
//! The pool is built once at process start and passed explicitly to every
//! service that needs it; there is no process-wide singleton.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Connect to PostgreSQL and return a ready connection pool.
///
/// `acquire_timeout` bounds how long a caller waits for a free connection;
/// statement-level lock waits are governed by the database's own
/// `lock_timeout` setting.
///
/// # Errors
///
/// Returns [`DbError::ConnectionFailed`] if the database is unreachable or
/// refuses the connection.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(DbError::ConnectionFailed)?;

    tracing::info!(max_connections, "Database pool connected");
    Ok(pool)
}
