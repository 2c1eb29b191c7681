//! Table model.
//!
//! A physical table available for loan. Status flips between `available`
//! and `checked_out` only through ledger transactions; `maintenance` is a
//! manual state entered and exited while no active checkout exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Status for tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "table_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Free to be checked out.
    Available,
    /// Currently on loan.
    CheckedOut,
    /// Out of service; excluded from checkout eligibility.
    Maintenance,
}

impl TableStatus {
    /// Check if the table can be checked out.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::CheckedOut => write!(f, "checked_out"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// A physical table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Table {
    /// Unique identifier.
    pub id: Uuid,

    /// Human-facing table number, unique.
    pub table_number: String,

    /// Current status.
    pub status: TableStatus,

    /// Where the table lives or is deployed.
    pub location: Option<String>,

    /// Seating capacity.
    pub capacity: Option<i32>,

    /// Free-text notes.
    pub notes: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTable {
    pub table_number: String,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub notes: Option<String>,
}

/// Partial update for a table's descriptive fields.
///
/// Status is deliberately absent: it only changes through ledger
/// transactions or the guarded maintenance transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTable {
    pub table_number: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub notes: Option<String>,
}

impl Table {
    /// Find a table by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM tables
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Find a table by ID with row-level locking.
    ///
    /// Uses `FOR UPDATE`. This lock is the sole serialization point for
    /// concurrent checkout attempts against the same table.
    pub async fn find_by_id_for_update<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM tables
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Find a table by its table number.
    pub async fn find_by_number(
        pool: &sqlx::PgPool,
        table_number: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM tables
            WHERE table_number = $1
            "#,
        )
        .bind(table_number)
        .fetch_optional(pool)
        .await
    }

    /// List tables, optionally filtered by status, ordered by table number.
    pub async fn list(
        pool: &sqlx::PgPool,
        status: Option<TableStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        match status {
            Some(status) => {
                sqlx::query_as(
                    r#"
                    SELECT * FROM tables
                    WHERE status = $1
                    ORDER BY table_number
                    "#,
                )
                .bind(status)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT * FROM tables
                    ORDER BY table_number
                    "#,
                )
                .fetch_all(pool)
                .await
            }
        }
    }

    /// Create a new available table.
    pub async fn create(pool: &sqlx::PgPool, input: NewTable) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO tables (table_number, location, capacity, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&input.table_number)
        .bind(&input.location)
        .bind(input.capacity)
        .bind(&input.notes)
        .fetch_one(pool)
        .await
    }

    /// Update descriptive fields, leaving unset fields unchanged.
    pub async fn update(
        pool: &sqlx::PgPool,
        id: Uuid,
        input: UpdateTable,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE tables
            SET table_number = COALESCE($2, table_number),
                location = COALESCE($3, location),
                capacity = COALESCE($4, capacity),
                notes = COALESCE($5, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.table_number)
        .bind(&input.location)
        .bind(input.capacity)
        .bind(&input.notes)
        .fetch_optional(pool)
        .await
    }

    /// Set a table's status within a transaction.
    pub async fn set_status_in_tx<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        id: Uuid,
        status: TableStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE tables
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Count all tables.
    pub async fn count(pool: &sqlx::PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tables
            "#,
        )
        .fetch_one(pool)
        .await
    }

    /// Count tables with a given status.
    pub async fn count_by_status(
        pool: &sqlx::PgPool,
        status: TableStatus,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tables
            WHERE status = $1
            "#,
        )
        .bind(status)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_available() {
        assert!(TableStatus::Available.is_available());
        assert!(!TableStatus::CheckedOut.is_available());
        assert!(!TableStatus::Maintenance.is_available());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TableStatus::CheckedOut.to_string(), "checked_out");
        assert_eq!(TableStatus::Maintenance.to_string(), "maintenance");
    }
}
