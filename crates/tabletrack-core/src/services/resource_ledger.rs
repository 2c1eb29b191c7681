//! Resource ledger service.
//!
//! The transactional state machine binding a table to its current
//! checkout. Checkout creation locks the table row; returning locks the
//! checkout row and then reads the table without an exclusive lock. That
//! ordering is kept consistent system-wide: no operation ever locks a
//! checkout row and then waits on its table row while a creator holds it.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tabletrack_db::models::{
    Checkout, CheckoutFilter, CheckoutStatus, NewCheckout, Organization, Table, TableStatus,
};

use crate::error::{CoreError, Result};
use crate::services::append_note;

/// Input for creating a checkout against a resolved organization.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub table_id: Uuid,
    pub organization_id: Uuid,
    pub expected_return_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub checked_out_by: Option<String>,
}

/// Input for returning a checkout.
#[derive(Debug, Clone, Default)]
pub struct ReturnRequest {
    pub returned_by: Option<String>,
    pub notes: Option<String>,
}

/// Point-in-time checkout statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutStats {
    pub total_active: i64,
    pub total_overdue: i64,
    pub today_checkouts: i64,
    pub total_tables: i64,
    pub available_tables: i64,
    pub checked_out_tables: i64,
    pub average_checkout_duration_hours: f64,
}

/// Service owning the checkout/return transactional invariants.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    pool: PgPool,
}

impl ResourceLedger {
    /// Create a ledger over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The pool this ledger operates on.
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch a checkout by ID.
    pub async fn get(&self, id: Uuid) -> Result<Checkout> {
        Checkout::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Checkout not found: {id}")))
    }

    /// Check a table out to an organization.
    ///
    /// Preconditions are checked twice: advisory checks outside the
    /// transaction fail fast without taking locks; the authoritative
    /// checks re-run under the table row lock so two callers racing past
    /// the advisory phase cannot both commit. The partial unique indexes
    /// are the final backstop for the one-active-checkout invariants.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<Checkout> {
        if request.expected_return_time <= Utc::now() {
            return Err(CoreError::Validation(
                "Expected return time must be in the future".to_string(),
            ));
        }

        let organization = Organization::find_by_id(&self.pool, request.organization_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "Organization not found: {}",
                    request.organization_id
                ))
            })?;
        self.ensure_not_banned(&organization)?;

        if let Some(existing) =
            Checkout::find_active_by_organization(&self.pool, organization.id).await?
        {
            let held = Table::find_by_id(&self.pool, existing.table_id).await?;
            let table_number = held
                .map(|t| t.table_number)
                .unwrap_or_else(|| existing.table_id.to_string());
            return Err(CoreError::Conflict(format!(
                "Organization \"{}\" already has an active checkout (Table {})",
                organization.official_name, table_number
            )));
        }

        let mut tx = self.pool.begin().await?;

        let table = Table::find_by_id_for_update(&mut tx, request.table_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("Table not found: {}", request.table_id))
            })?;

        if table.status != TableStatus::Available {
            return Err(CoreError::Conflict(format!(
                "Table {} is not available (current status: {})",
                table.table_number, table.status
            )));
        }

        // Re-check under the lock: the organization may have been banned or
        // acquired a table between the advisory phase and here.
        let organization = Organization::find_by_id_in_tx(&mut tx, request.organization_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "Organization not found: {}",
                    request.organization_id
                ))
            })?;
        self.ensure_not_banned(&organization)?;

        if Checkout::find_active_by_organization(&mut *tx, organization.id)
            .await?
            .is_some()
        {
            return Err(CoreError::Conflict(format!(
                "Organization \"{}\" already has an active checkout",
                organization.official_name
            )));
        }

        let checkout = Checkout::create_in_tx(
            &mut tx,
            NewCheckout {
                organization_id: organization.id,
                table_id: table.id,
                expected_return_time: request.expected_return_time,
                notes: normalize_text(request.notes),
                checked_out_by: normalize_text(request.checked_out_by),
            },
        )
        .await?;

        Table::set_status_in_tx(&mut tx, table.id, TableStatus::CheckedOut).await?;

        tx.commit().await?;

        tracing::info!(
            checkout_id = %checkout.id,
            table_number = %table.table_number,
            organization = %organization.official_name,
            "Checked out table"
        );
        Ok(checkout)
    }

    /// Return a checkout.
    ///
    /// Locks the checkout row, records the actual return time and the
    /// returning party, appends any return notes, and frees the table.
    /// Overdue status is derived for reporting and never blocks a return.
    pub async fn return_checkout(&self, id: Uuid, request: ReturnRequest) -> Result<Checkout> {
        let mut tx = self.pool.begin().await?;

        let checkout = Checkout::find_by_id_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Checkout not found: {id}")))?;

        match checkout.status {
            CheckoutStatus::Returned => {
                return Err(CoreError::Conflict(
                    "Checkout has already been returned".to_string(),
                ));
            }
            CheckoutStatus::Active => {}
        }

        let now = Utc::now();
        let notes = match request.notes.as_deref().map(str::trim) {
            Some(note) if !note.is_empty() => Some(append_note(
                checkout.notes.as_deref(),
                &format!("[Return] {note}"),
            )),
            _ => checkout.notes.clone(),
        };

        let returned_by = normalize_text(request.returned_by);
        let updated = Checkout::mark_returned_in_tx(
            &mut tx,
            id,
            now,
            returned_by.as_deref(),
            notes.as_deref(),
        )
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Checkout not found: {id}")))?;

        Table::set_status_in_tx(&mut tx, checkout.table_id, TableStatus::Available)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("Table not found: {}", checkout.table_id))
            })?;

        tx.commit().await?;

        tracing::info!(
            checkout_id = %updated.id,
            overdue = updated.is_overdue(now),
            "Returned table"
        );
        Ok(updated)
    }

    /// All active checkouts, newest first.
    pub async fn active_checkouts(&self) -> Result<Vec<Checkout>> {
        Ok(Checkout::list_active(&self.pool).await?)
    }

    /// Active checkouts past their expected return time, most overdue first.
    pub async fn overdue_checkouts(&self) -> Result<Vec<Checkout>> {
        Ok(Checkout::list_overdue(&self.pool, Utc::now()).await?)
    }

    /// Filtered checkout listing with pagination.
    pub async fn list(
        &self,
        filter: &CheckoutFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Checkout>> {
        Ok(Checkout::list(&self.pool, filter, limit, offset).await?)
    }

    /// Point-in-time statistics for the dashboard collaborator.
    pub async fn stats(&self) -> Result<CheckoutStats> {
        let now = Utc::now();
        let today_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let tomorrow_start = today_start + Duration::days(1);

        let total_active = Checkout::count_active(&self.pool).await?;
        let total_overdue = Checkout::count_overdue(&self.pool, now).await?;
        let today_checkouts =
            Checkout::count_started_between(&self.pool, today_start, tomorrow_start).await?;
        let total_tables = Table::count(&self.pool).await?;
        let available_tables = Table::count_by_status(&self.pool, TableStatus::Available).await?;
        let checked_out_tables =
            Table::count_by_status(&self.pool, TableStatus::CheckedOut).await?;

        let avg_seconds =
            Checkout::avg_completed_duration_seconds(&self.pool, today_start, tomorrow_start)
                .await?
                .unwrap_or(0.0);
        let average_checkout_duration_hours = (avg_seconds / 3600.0 * 100.0).round() / 100.0;

        Ok(CheckoutStats {
            total_active,
            total_overdue,
            today_checkouts,
            total_tables,
            available_tables,
            checked_out_tables,
            average_checkout_duration_hours,
        })
    }

    /// Take a table out of service.
    ///
    /// Only possible while no active checkout references the table.
    pub async fn set_maintenance(&self, table_id: Uuid) -> Result<Table> {
        self.set_manual_status(table_id, TableStatus::Maintenance)
            .await
    }

    /// Put a table back in service after maintenance.
    pub async fn set_available(&self, table_id: Uuid) -> Result<Table> {
        self.set_manual_status(table_id, TableStatus::Available)
            .await
    }

    async fn set_manual_status(&self, table_id: Uuid, status: TableStatus) -> Result<Table> {
        let mut tx = self.pool.begin().await?;

        let table = Table::find_by_id_for_update(&mut tx, table_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Table not found: {table_id}")))?;

        if table.status == TableStatus::CheckedOut
            || Checkout::find_active_by_table(&mut *tx, table_id)
                .await?
                .is_some()
        {
            return Err(CoreError::Conflict(format!(
                "Table {} has an active checkout",
                table.table_number
            )));
        }

        let updated = Table::set_status_in_tx(&mut tx, table_id, status)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Table not found: {table_id}")))?;

        tx.commit().await?;

        tracing::info!(
            table_number = %updated.table_number,
            status = %updated.status,
            "Table status changed manually"
        );
        Ok(updated)
    }

    fn ensure_not_banned(&self, organization: &Organization) -> Result<()> {
        if organization.status.is_banned() {
            return Err(CoreError::Conflict(format!(
                "Organization \"{}\" is currently banned: {}",
                organization.official_name,
                organization.ban_reason.as_deref().unwrap_or("Policy violation")
            )));
        }
        Ok(())
    }
}

/// Trim free-text input, mapping blank values to None.
fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
