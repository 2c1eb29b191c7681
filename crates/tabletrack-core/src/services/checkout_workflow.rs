//! Checkout workflow service.
//!
//! The single entry point the API layer calls to create or return a
//! checkout: resolves the organization name, consults ban and
//! active-checkout state, then executes the ledger transaction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use tabletrack_db::models::{Checkout, Organization};

use crate::error::{CoreError, Result};
use crate::services::name_resolver::{MatcherConfig, NameMatch};
use crate::services::organization_directory::OrganizationDirectory;
use crate::services::resource_ledger::{CheckoutRequest, ResourceLedger, ReturnRequest};

/// Input for creating a checkout.
///
/// Exactly one of `organization_id` and `organization_name` is required;
/// an id wins when both are present.
#[derive(Debug, Clone, Validate)]
pub struct CreateCheckoutInput {
    pub table_id: Uuid,
    pub organization_id: Option<Uuid>,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub organization_name: Option<String>,
    pub expected_return_time: DateTime<Utc>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub checked_out_by: Option<String>,
}

/// Input for returning a checkout.
#[derive(Debug, Clone, Default, Validate)]
pub struct ReturnCheckoutInput {
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub returned_by: Option<String>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Outcome of validating a checkout attempt for a free-text name.
///
/// Drives the confirmation flow: either the attempt can proceed directly,
/// needs the caller to confirm against similar existing organizations, or
/// is blocked outright.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutValidation {
    /// Whether a checkout for this name may proceed as-is.
    pub allowed: bool,
    /// Whether the caller should confirm against the ranked matches first.
    pub requires_confirmation: bool,
    /// The organization the name resolved to, when an exact match exists.
    pub resolved_organization: Option<Organization>,
    /// Ranked candidate matches for the input name.
    pub matches: Vec<NameMatch>,
    /// Human-readable explanation of the outcome.
    pub message: String,
}

/// Orchestrates name resolution, ban checks, and ledger transactions.
#[derive(Debug, Clone)]
pub struct CheckoutWorkflow {
    directory: OrganizationDirectory,
    ledger: ResourceLedger,
}

impl CheckoutWorkflow {
    /// Build a workflow with default matcher thresholds.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            directory: OrganizationDirectory::new(pool.clone()),
            ledger: ResourceLedger::new(pool),
        }
    }

    /// Build a workflow with custom matcher thresholds.
    #[must_use]
    pub fn with_matcher_config(pool: PgPool, config: MatcherConfig) -> Self {
        Self {
            directory: OrganizationDirectory::with_matcher_config(pool.clone(), config),
            ledger: ResourceLedger::new(pool),
        }
    }

    /// The organization directory behind this workflow.
    #[must_use]
    pub fn directory(&self) -> &OrganizationDirectory {
        &self.directory
    }

    /// The resource ledger behind this workflow.
    #[must_use]
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Create a checkout.
    ///
    /// Resolves the organization by id, or by name through the fuzzy
    /// resolver (creating a new organization when nothing matches), then
    /// runs the ledger transaction.
    pub async fn create_checkout(&self, input: CreateCheckoutInput) -> Result<Checkout> {
        input
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        let organization = match (input.organization_id, input.organization_name.as_deref()) {
            (Some(id), _) => self.directory.get(id).await?,
            (None, Some(name)) => self.directory.resolve_or_create(name).await?,
            (None, None) => {
                return Err(CoreError::Validation(
                    "Organization ID or name is required".to_string(),
                ));
            }
        };

        self.ledger
            .checkout(CheckoutRequest {
                table_id: input.table_id,
                organization_id: organization.id,
                expected_return_time: input.expected_return_time,
                notes: input.notes,
                checked_out_by: input.checked_out_by,
            })
            .await
    }

    /// Return a checkout.
    pub async fn return_checkout(
        &self,
        checkout_id: Uuid,
        input: ReturnCheckoutInput,
    ) -> Result<Checkout> {
        input
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        self.ledger
            .return_checkout(
                checkout_id,
                ReturnRequest {
                    returned_by: input.returned_by,
                    notes: input.notes,
                },
            )
            .await
    }

    /// Validate a checkout attempt for a free-text organization name.
    ///
    /// Feeds the "did you mean" confirmation flow without mutating any
    /// state: an exact match resolves directly (and is blocked here when
    /// banned or already holding a table); similar-but-not-exact matches
    /// ask the caller to confirm; no matches means a new organization
    /// would be created.
    pub async fn validate_checkout_attempt(&self, name: &str) -> Result<CheckoutValidation> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation(
                "Organization name is required".to_string(),
            ));
        }

        let matches = self.directory.find_matches(trimmed).await?;

        if matches.is_empty() {
            return Ok(CheckoutValidation {
                allowed: true,
                requires_confirmation: false,
                resolved_organization: None,
                matches,
                message: "No existing organizations found. A new organization will be created"
                    .to_string(),
            });
        }

        let exact_threshold = self.directory.resolver().config().exact_match_threshold;
        if let Some(exact) = matches.iter().find(|m| m.score >= exact_threshold) {
            let organization = exact.organization.clone();

            if organization.status.is_banned() {
                return Ok(CheckoutValidation {
                    allowed: false,
                    requires_confirmation: false,
                    message: format!(
                        "Organization \"{}\" is banned: {}",
                        organization.official_name,
                        organization.ban_reason.as_deref().unwrap_or("Policy violation")
                    ),
                    resolved_organization: Some(organization),
                    matches,
                });
            }

            if Checkout::find_active_by_organization(self.ledger.pool(), organization.id)
                .await?
                .is_some()
            {
                return Ok(CheckoutValidation {
                    allowed: false,
                    requires_confirmation: false,
                    message: format!(
                        "Organization \"{}\" already has an active checkout",
                        organization.official_name
                    ),
                    resolved_organization: Some(organization),
                    matches,
                });
            }

            return Ok(CheckoutValidation {
                allowed: true,
                requires_confirmation: false,
                message: format!(
                    "Exact match found: \"{}\"",
                    organization.official_name
                ),
                resolved_organization: Some(organization),
                matches,
            });
        }

        Ok(CheckoutValidation {
            allowed: false,
            requires_confirmation: true,
            resolved_organization: None,
            matches,
            message: "Similar organizations found. Confirm whether this is a new organization \
                      or select an existing one"
                .to_string(),
        })
    }
}
