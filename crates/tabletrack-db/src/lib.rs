//! Persistence layer for the tabletrack checkout system.
//!
//! Provides sqlx-backed models for organizations, tables, and checkouts,
//! plus pool construction and embedded SQL migrations. All concurrency
//! control happens through PostgreSQL transactions and row-level locks;
//! this crate holds no in-process shared state.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::connect;
