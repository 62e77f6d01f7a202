//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Parse connection locators (`sqlite::memory:`, `sqlite://path`, bare path).
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas and run migrations before returning.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const MEMORY_LOCATORS: &[&str] = &["sqlite::memory:", ":memory:"];
const SQLITE_SCHEME: &str = "sqlite://";

/// Concrete storage target resolved from a connection locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Memory,
    File(PathBuf),
}

impl StoreTarget {
    /// Parses an opaque connection locator.
    ///
    /// # Errors
    /// - Returns `DbError::InvalidLocator` for empty locators or an empty
    ///   path after the `sqlite://` scheme.
    pub fn parse(locator: &str) -> DbResult<Self> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(DbError::InvalidLocator(locator.to_string()));
        }
        if MEMORY_LOCATORS.contains(&trimmed) {
            return Ok(Self::Memory);
        }

        let path = trimmed.strip_prefix(SQLITE_SCHEME).unwrap_or(trimmed);
        if path.is_empty() {
            return Err(DbError::InvalidLocator(locator.to_string()));
        }
        Ok(Self::File(PathBuf::from(path)))
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File(_) => "file",
        }
    }
}

impl Display for StoreTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Opens a SQLite database file and applies all pending migrations.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_target(&StoreTarget::File(path.as_ref().to_path_buf()))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_target(&StoreTarget::Memory)
}

/// Opens the resolved target and bootstraps it.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_target(target: &StoreTarget) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let opened = match target {
        StoreTarget::Memory => Connection::open_in_memory(),
        StoreTarget::File(path) => Connection::open(path),
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn)?;
    Ok(())
}
