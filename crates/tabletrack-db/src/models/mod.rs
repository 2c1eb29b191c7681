//! Database entity models for tabletrack-db.
//!
//! These models represent the database tables and provide
//! type-safe interactions with PostgreSQL.

pub mod checkout;
pub mod organization;
pub mod table;

pub use checkout::{Checkout, CheckoutFilter, CheckoutStatus, NewCheckout};
pub use organization::{NewOrganization, Organization, OrganizationStatus};
pub use table::{NewTable, Table, TableStatus, UpdateTable};
