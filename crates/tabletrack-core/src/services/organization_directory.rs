//! Organization directory service.
//!
//! Owns organization records and the ban/unban state transitions,
//! including the cascading auto-return of active checkouts when an
//! organization with tables on loan is banned.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use tabletrack_db::models::{
    Checkout, NewOrganization, Organization, OrganizationStatus, Table, TableStatus,
};

use crate::error::{CoreError, Result};
use crate::services::append_note;
use crate::services::name_resolver::{MatcherConfig, NameMatch, NameResolver};

/// Default category for organizations created from a checkout attempt.
const DEFAULT_CATEGORY: &str = "Student Organization";

/// Recorded as the returning party on ban-cascade auto-returns.
const BAN_RETURN_ACTOR: &str = "SYSTEM - Ban Action";

/// Maximum accepted length for a ban reason.
const MAX_BAN_REASON_LEN: usize = 500;

/// Input for explicitly creating an organization.
#[derive(Debug, Clone, Validate)]
pub struct CreateOrganizationInput {
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub official_name: String,
    pub aliases: Vec<String>,
    pub category: Option<String>,
}

/// Result of banning an organization.
#[derive(Debug, Clone)]
pub struct BanOutcome {
    /// The organization after the ban was applied.
    pub organization: Organization,
    /// How many active checkouts were auto-returned by the cascade.
    pub returned_checkouts: usize,
}

/// Service owning organization identity and ban state.
#[derive(Debug, Clone)]
pub struct OrganizationDirectory {
    pool: PgPool,
    resolver: NameResolver,
}

impl OrganizationDirectory {
    /// Create a directory with default matcher thresholds.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            resolver: NameResolver::new(),
        }
    }

    /// Create a directory with custom matcher thresholds.
    #[must_use]
    pub fn with_matcher_config(pool: PgPool, config: MatcherConfig) -> Self {
        Self {
            pool,
            resolver: NameResolver::with_config(config),
        }
    }

    /// The resolver this directory matches with.
    #[must_use]
    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    /// Fetch an organization by ID.
    pub async fn get(&self, id: Uuid) -> Result<Organization> {
        Organization::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Organization not found: {id}")))
    }

    /// Explicitly create an organization.
    pub async fn create(&self, input: CreateOrganizationInput) -> Result<Organization> {
        input
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        let organization = Organization::create(
            &self.pool,
            NewOrganization {
                official_name: input.official_name.trim().to_string(),
                aliases: input.aliases,
                category: input.category,
            },
        )
        .await?;

        tracing::info!(
            organization_id = %organization.id,
            official_name = %organization.official_name,
            "Created organization"
        );
        Ok(organization)
    }

    /// Rank known organizations against a free-text name.
    ///
    /// The candidate pool deliberately includes banned organizations so a
    /// variant of a banned name resolves to the banned record; callers
    /// surface those matches instead of treating the name as new.
    pub async fn find_matches(&self, name: &str) -> Result<Vec<NameMatch>> {
        let candidates = Organization::list_all(&self.pool).await?;
        Ok(self.resolver.match_candidates(name, &candidates))
    }

    /// Resolve a free-text name to an existing organization, or create one.
    ///
    /// An exact match (score at or above the exact threshold) resolves to
    /// the matched record, banned or not. Otherwise a new active
    /// organization is created with the name's generated variations
    /// pre-seeded as aliases, so future near-miss lookups land on it.
    pub async fn resolve_or_create(&self, name: &str) -> Result<Organization> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation(
                "Organization name is required".to_string(),
            ));
        }

        let matches = self.find_matches(trimmed).await?;
        if let Some(exact) = matches
            .iter()
            .find(|m| m.score >= self.resolver.config().exact_match_threshold)
        {
            return Ok(exact.organization.clone());
        }

        let normalized = self.resolver.normalize(trimmed);
        let aliases: Vec<String> = self
            .resolver
            .variations(trimmed)
            .into_iter()
            .filter(|variation| *variation != normalized)
            .collect();

        let organization = Organization::create(
            &self.pool,
            NewOrganization {
                official_name: trimmed.to_string(),
                aliases,
                category: Some(DEFAULT_CATEGORY.to_string()),
            },
        )
        .await?;

        tracing::info!(
            organization_id = %organization.id,
            official_name = %organization.official_name,
            "Created organization from unresolved checkout name"
        );
        Ok(organization)
    }

    /// Search organizations by name fragment or exact alias.
    pub async fn search(&self, query: &str, limit: i64, offset: i64) -> Result<Vec<Organization>> {
        Ok(Organization::search(&self.pool, query, limit, offset).await?)
    }

    /// Ban an organization.
    ///
    /// Runs in a single transaction. If the organization holds tables and
    /// `cascade_return` is false, the ban fails with a conflict naming the
    /// blocking table numbers. With `cascade_return` true, every active
    /// checkout is returned and its table freed before the ban lands, so a
    /// partial cascade never commits. Lock order: organization row, then
    /// checkout rows, then table rows.
    pub async fn ban(&self, id: Uuid, reason: &str, cascade_return: bool) -> Result<BanOutcome> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::Validation("Ban reason is required".to_string()));
        }
        if reason.chars().count() > MAX_BAN_REASON_LEN {
            return Err(CoreError::Validation(format!(
                "Ban reason must be at most {MAX_BAN_REASON_LEN} characters"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let organization = Organization::find_by_id_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Organization not found: {id}")))?;

        if organization.status.is_banned() {
            return Err(CoreError::Conflict(format!(
                "Organization \"{}\" is already banned",
                organization.official_name
            )));
        }

        let active = Checkout::find_active_by_organization_for_update(&mut tx, id).await?;

        if !active.is_empty() && !cascade_return {
            let mut table_numbers = Vec::with_capacity(active.len());
            for checkout in &active {
                let table = Table::find_by_id_for_update(&mut tx, checkout.table_id)
                    .await?
                    .ok_or_else(|| {
                        CoreError::NotFound(format!("Table not found: {}", checkout.table_id))
                    })?;
                table_numbers.push(table.table_number);
            }
            return Err(CoreError::Conflict(format!(
                "Organization has {} active checkout(s) for table(s): {}. \
                 Enable cascade return to automatically return them when banning",
                active.len(),
                table_numbers.join(", ")
            )));
        }

        let now = Utc::now();
        for checkout in &active {
            let notes = append_note(
                checkout.notes.as_deref(),
                &format!("[Auto-returned] Organization banned: {reason}"),
            );
            Checkout::mark_returned_in_tx(
                &mut tx,
                checkout.id,
                now,
                Some(BAN_RETURN_ACTOR),
                Some(&notes),
            )
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("Checkout not found: {}", checkout.id))
            })?;

            let table = Table::find_by_id_for_update(&mut tx, checkout.table_id)
                .await?
                .ok_or_else(|| {
                    CoreError::NotFound(format!("Table not found: {}", checkout.table_id))
                })?;
            Table::set_status_in_tx(&mut tx, table.id, TableStatus::Available).await?;
        }

        let banned = Organization::set_banned_in_tx(&mut tx, id, reason, now)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Organization not found: {id}")))?;

        tx.commit().await?;

        tracing::info!(
            organization_id = %banned.id,
            official_name = %banned.official_name,
            returned_checkouts = active.len(),
            "Banned organization"
        );

        Ok(BanOutcome {
            organization: banned,
            returned_checkouts: active.len(),
        })
    }

    /// Lift a ban.
    ///
    /// The ban date is cleared. With notes, the reason field keeps an audit
    /// trail referencing the prior ban; without notes it is cleared.
    pub async fn unban(&self, id: Uuid, notes: Option<&str>) -> Result<Organization> {
        let mut tx = self.pool.begin().await?;

        let organization = Organization::find_by_id_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Organization not found: {id}")))?;

        if organization.status != OrganizationStatus::Banned {
            return Err(CoreError::Conflict(format!(
                "Organization \"{}\" is not currently banned (status: {})",
                organization.official_name, organization.status
            )));
        }

        let audit_reason = notes.map(|n| {
            format!(
                "[UNBANNED] {}\n[PREVIOUS BAN] {}",
                n.trim(),
                organization
                    .ban_reason
                    .as_deref()
                    .unwrap_or("No reason provided")
            )
        });

        let unbanned = Organization::set_unbanned_in_tx(&mut tx, id, audit_reason.as_deref())
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Organization not found: {id}")))?;

        tx.commit().await?;

        tracing::info!(
            organization_id = %unbanned.id,
            official_name = %unbanned.official_name,
            "Unbanned organization"
        );
        Ok(unbanned)
    }
}

