//! Core domain logic for the tabletrack checkout system.
//!
//! Guarantees, under concurrent access, that a table is never loaned to
//! two organizations at once, that an organization never holds two tables
//! at once, and that banned organizations cannot acquire tables.
//! Organization identity is reconciled from free text by a fuzzy name
//! resolver so duplicate records and ban evasion via name variants are
//! caught.
//!
//! # Components
//!
//! - [`services::NameResolver`] — normalizes and fuzzy-matches free-text
//!   names against known organizations and their aliases.
//! - [`services::OrganizationDirectory`] — owns organization records and
//!   the ban/unban transitions, including the cascading auto-return.
//! - [`services::ResourceLedger`] — the transactional checkout/return
//!   state machine, serialized by row locks.
//! - [`services::CheckoutWorkflow`] — composes the three; the only entry
//!   point the API layer calls for creating or returning a checkout.

pub mod config;
pub mod error;
pub mod services;

pub use config::{Config, ConfigError};
pub use error::{CoreError, Result};
pub use services::{
    BanOutcome, CheckoutRequest, CheckoutStats, CheckoutValidation, CheckoutWorkflow,
    CreateCheckoutInput, CreateOrganizationInput, MatchType, MatcherConfig, NameMatch,
    NameResolver, OrganizationDirectory, ResourceLedger, ReturnCheckoutInput, ReturnRequest,
};
