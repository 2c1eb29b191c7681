//! Checkout model.
//!
//! A checkout is the loan relationship binding an organization to a table.
//! It is the only entity allowed to flip a table between `available` and
//! `checked_out`. Rows are never deleted; returning is a terminal
//! transition recorded with the actual return time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Status for checkouts.
///
/// "Overdue" is intentionally not a status: it is derived at read time
/// from the expected and actual return times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "checkout_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    /// The table is currently on loan.
    Active,
    /// The table has been returned. Terminal.
    Returned,
}

impl CheckoutStatus {
    /// Check if the checkout is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the checkout has reached its terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Returned)
    }
}

impl std::fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Returned => write!(f, "returned"),
        }
    }
}

/// A table loan.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Checkout {
    /// Unique identifier.
    pub id: Uuid,

    /// The borrowing organization.
    pub organization_id: Uuid,

    /// The table on loan.
    pub table_id: Uuid,

    /// When the loan started.
    pub checkout_time: DateTime<Utc>,

    /// When the table is due back. Strictly after `checkout_time`.
    pub expected_return_time: DateTime<Utc>,

    /// When the table actually came back. Null while active.
    pub actual_return_time: Option<DateTime<Utc>>,

    /// Current status.
    pub status: CheckoutStatus,

    /// Free-text notes; return notes are appended, never overwritten.
    pub notes: Option<String>,

    /// Who took the table out.
    pub checked_out_by: Option<String>,

    /// Who brought the table back.
    pub returned_by: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new checkout row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCheckout {
    pub organization_id: Uuid,
    pub table_id: Uuid,
    pub expected_return_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub checked_out_by: Option<String>,
}

/// Filter options for listing checkouts.
#[derive(Debug, Clone, Default)]
pub struct CheckoutFilter {
    pub status: Option<CheckoutStatus>,
    pub organization_id: Option<Uuid>,
    pub table_id: Option<Uuid>,
    /// Restrict to active checkouts past their expected return time.
    pub overdue_as_of: Option<DateTime<Utc>>,
}

impl Checkout {
    /// Whether this checkout is overdue as of `now`.
    ///
    /// Active checkouts are overdue once `now` passes the expected return
    /// time; returned checkouts are overdue if they came back late.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            CheckoutStatus::Active => now > self.expected_return_time,
            CheckoutStatus::Returned => self
                .actual_return_time
                .is_some_and(|actual| actual > self.expected_return_time),
        }
    }

    /// Find a checkout by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM checkouts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Find a checkout by ID with row-level locking.
    ///
    /// Uses `FOR UPDATE` so only one return can act on the row at a time.
    pub async fn find_by_id_for_update<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM checkouts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Find the active checkout for an organization, if any.
    pub async fn find_active_by_organization<'e, E>(
        executor: E,
        organization_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r#"
            SELECT * FROM checkouts
            WHERE organization_id = $1 AND status = 'active'
            "#,
        )
        .bind(organization_id)
        .fetch_optional(executor)
        .await
    }

    /// Lock and return every active checkout for an organization.
    ///
    /// Used by the ban cascade, which locks the organization row first,
    /// then these checkout rows, then the affected table rows.
    pub async fn find_active_by_organization_for_update<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM checkouts
            WHERE organization_id = $1 AND status = 'active'
            ORDER BY checkout_time
            FOR UPDATE
            "#,
        )
        .bind(organization_id)
        .fetch_all(&mut **tx)
        .await
    }

    /// Find the active checkout for a table, if any.
    pub async fn find_active_by_table<'e, E>(
        executor: E,
        table_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r#"
            SELECT * FROM checkouts
            WHERE table_id = $1 AND status = 'active'
            "#,
        )
        .bind(table_id)
        .fetch_optional(executor)
        .await
    }

    /// List checkouts with filtering and pagination, newest first.
    pub async fn list(
        pool: &sqlx::PgPool,
        filter: &CheckoutFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(
            r#"
            SELECT * FROM checkouts
            WHERE TRUE
            "#,
        );
        let mut param_count = 0;

        if filter.status.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND status = ${param_count}"));
        }
        if filter.organization_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND organization_id = ${param_count}"));
        }
        if filter.table_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND table_id = ${param_count}"));
        }
        if filter.overdue_as_of.is_some() {
            param_count += 1;
            query.push_str(&format!(
                " AND status = 'active' AND expected_return_time < ${param_count}"
            ));
        }

        query.push_str(&format!(
            " ORDER BY checkout_time DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        ));

        let mut q = sqlx::query_as::<_, Checkout>(&query);

        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(organization_id) = filter.organization_id {
            q = q.bind(organization_id);
        }
        if let Some(table_id) = filter.table_id {
            q = q.bind(table_id);
        }
        if let Some(overdue_as_of) = filter.overdue_as_of {
            q = q.bind(overdue_as_of);
        }

        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// List all active checkouts, newest first.
    pub async fn list_active(pool: &sqlx::PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM checkouts
            WHERE status = 'active'
            ORDER BY checkout_time DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// List active checkouts past their expected return time, most overdue
    /// first.
    pub async fn list_overdue(
        pool: &sqlx::PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM checkouts
            WHERE status = 'active' AND expected_return_time < $1
            ORDER BY expected_return_time ASC
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }

    /// Insert a new active checkout within a transaction.
    ///
    /// The partial unique indexes on `(organization_id) WHERE active` and
    /// `(table_id) WHERE active` reject any concurrent duplicate that
    /// slipped past the application-level checks.
    pub async fn create_in_tx<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        input: NewCheckout,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO checkouts (
                organization_id, table_id, expected_return_time, notes, checked_out_by
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.organization_id)
        .bind(input.table_id)
        .bind(input.expected_return_time)
        .bind(&input.notes)
        .bind(&input.checked_out_by)
        .fetch_one(&mut **tx)
        .await
    }

    /// Mark a checkout returned within a transaction.
    ///
    /// `notes` is the full replacement value; the caller computes it from
    /// the locked row so return notes append to the existing text.
    pub async fn mark_returned_in_tx<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        id: Uuid,
        actual_return_time: DateTime<Utc>,
        returned_by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE checkouts
            SET status = 'returned',
                actual_return_time = $2,
                returned_by = $3,
                notes = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(actual_return_time)
        .bind(returned_by)
        .bind(notes)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Count active checkouts.
    pub async fn count_active(pool: &sqlx::PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM checkouts
            WHERE status = 'active'
            "#,
        )
        .fetch_one(pool)
        .await
    }

    /// Count active checkouts past their expected return time.
    pub async fn count_overdue(
        pool: &sqlx::PgPool,
        now: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM checkouts
            WHERE status = 'active' AND expected_return_time < $1
            "#,
        )
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Count checkouts that started within a time window.
    pub async fn count_started_between(
        pool: &sqlx::PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM checkouts
            WHERE checkout_time >= $1 AND checkout_time < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await
    }

    /// Average duration in seconds of checkouts started within a window
    /// that have been returned. None if there are no completed checkouts.
    pub async fn avg_completed_duration_seconds(
        pool: &sqlx::PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT AVG(EXTRACT(EPOCH FROM (actual_return_time - checkout_time)))::float8
            FROM checkouts
            WHERE checkout_time >= $1 AND checkout_time < $2
              AND actual_return_time IS NOT NULL
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await
    }
}
