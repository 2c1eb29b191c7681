//! Core services: name resolution, organization directory, checkout ledger,
//! and the workflow that composes them.

pub mod checkout_workflow;
pub mod name_resolver;
pub mod organization_directory;
pub mod resource_ledger;

pub use checkout_workflow::{
    CheckoutValidation, CheckoutWorkflow, CreateCheckoutInput, ReturnCheckoutInput,
};
pub use name_resolver::{MatchType, MatcherConfig, NameMatch, NameResolver};
pub use organization_directory::{BanOutcome, CreateOrganizationInput, OrganizationDirectory};
pub use resource_ledger::{CheckoutRequest, CheckoutStats, ResourceLedger, ReturnRequest};

/// Append a bracketed annotation to existing free text, preserving what is
/// already there. Checkout notes are only ever appended to, never replaced.
pub(crate) fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        Some(text) if !text.trim().is_empty() => format!("{text}\n{note}"),
        _ => note.to_string(),
    }
}
