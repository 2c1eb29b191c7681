//! Organization model.
//!
//! An organization is a party that borrows tables. Identity is reconciled
//! against `official_name` and `aliases` by the name resolver; ban state
//! lives here and gates checkout eligibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Status for organizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "organization_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    /// Eligible to check out tables.
    Active,
    /// Barred from checking out tables.
    Banned,
}

impl OrganizationStatus {
    /// Check if the organization is banned.
    #[must_use]
    pub fn is_banned(&self) -> bool {
        matches!(self, Self::Banned)
    }
}

impl std::fmt::Display for OrganizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Banned => write!(f, "banned"),
        }
    }
}

/// A borrowing organization.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier.
    pub id: Uuid,

    /// Canonical name, unique across all organizations.
    pub official_name: String,

    /// Alternate names this organization is known by. Not unique across
    /// organizations; used by the name resolver as additional match targets.
    pub aliases: Vec<String>,

    /// Free-text category (e.g. "Student Organization").
    pub category: Option<String>,

    /// Current status.
    pub status: OrganizationStatus,

    /// Why the organization was banned. Set iff status is banned; after an
    /// unban with notes it carries the audit trail of the prior ban.
    pub ban_reason: Option<String>,

    /// When the organization was banned. Set iff status is banned.
    pub ban_date: Option<DateTime<Utc>>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrganization {
    pub official_name: String,
    pub aliases: Vec<String>,
    pub category: Option<String>,
}

impl Organization {
    /// Find an organization by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Find an organization by ID within a transaction (no lock).
    ///
    /// Used to re-read ban status under an already-held table lock.
    pub async fn find_by_id_in_tx<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Find an organization by ID with row-level locking.
    ///
    /// Uses `FOR UPDATE` so ban/unban transitions are serialized per row.
    pub async fn find_by_id_for_update<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM organizations
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Find an organization by exact canonical name.
    pub async fn find_by_official_name(
        pool: &sqlx::PgPool,
        official_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM organizations
            WHERE official_name = $1
            "#,
        )
        .bind(official_name)
        .fetch_optional(pool)
        .await
    }

    /// List all organizations, in insertion order.
    ///
    /// This is the candidate pool for name resolution. Banned organizations
    /// are included so that name variants of a banned organization resolve
    /// to the banned record instead of minting a fresh one.
    pub async fn list_all(pool: &sqlx::PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM organizations
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Search by case-insensitive name fragment or exact alias membership.
    pub async fn search(
        pool: &sqlx::PgPool,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM organizations
            WHERE official_name ILIKE '%' || $1 || '%'
               OR $1 = ANY(aliases)
            ORDER BY official_name
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(query)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Create a new active organization.
    pub async fn create(pool: &sqlx::PgPool, input: NewOrganization) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO organizations (official_name, aliases, category)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&input.official_name)
        .bind(&input.aliases)
        .bind(&input.category)
        .fetch_one(pool)
        .await
    }

    /// Mark an organization banned within a transaction.
    pub async fn set_banned_in_tx<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        id: Uuid,
        reason: &str,
        ban_date: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE organizations
            SET status = 'banned',
                ban_reason = $2,
                ban_date = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(ban_date)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Clear an organization's ban within a transaction.
    ///
    /// `ban_reason` may carry an audit note referencing the prior ban; the
    /// ban date is always cleared.
    pub async fn set_unbanned_in_tx<'e>(
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
        id: Uuid,
        ban_reason: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE organizations
            SET status = 'active',
                ban_reason = $2,
                ban_date = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ban_reason)
        .fetch_optional(&mut **tx)
        .await
    }
}
