//! SQLite storage bootstrap, connection lifecycle and schema migrations.
//!
//! # Responsibility
//! - Resolve connection locators into concrete storage targets.
//! - Open and configure SQLite connections for orderdesk core.
//! - Establish the single process-wide connection handle with bounded retry.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write order data before migrations succeed.
//! - At most one connection attempt is in flight per `ConnectionManager`.

mod connection;
pub mod migrations;
mod open;

pub use connection::{ConnectionError, ConnectionManager, ConnectionState, DbHandle, RetryPolicy};
pub use open::{open_db, open_db_in_memory, open_target, StoreTarget};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("invalid connection locator `{0}`")]
    InvalidLocator(String),
}
