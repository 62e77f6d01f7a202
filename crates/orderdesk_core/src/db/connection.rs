//! Process-wide connection lifecycle.
//!
//! # Responsibility
//! - Establish the store connection once at startup with bounded retry.
//! - Cache the resulting handle for the rest of the process lifetime.
//!
//! # Invariants
//! - Lifecycle is `Idle -> Attempting -> Connected | Failed`.
//! - The attempt gate is held for the whole attempt sequence, so at most one
//!   connection attempt is in flight and later callers observe the cached
//!   handle without re-attempting.
//! - The inter-retry sleep is the only blocking suspension in this module.

use super::open::{open_target, StoreTarget};
use super::{DbError, DbResult};
use log::{error, info, warn};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Shared handle to the single store connection.
///
/// Clones refer to the same underlying connection.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    conn: Mutex<Connection>,
    target: String,
}

impl DbHandle {
    /// Wraps an already bootstrapped connection.
    pub fn new(conn: Connection, target: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                conn: Mutex::new(conn),
                target: target.into(),
            }),
        }
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        // The connection keeps no Rust-side invariants a panic could break.
        let conn = self
            .inner
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    /// Human-readable target this handle is connected to.
    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Returns whether both handles share the same connection.
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("target", &self.inner.target)
            .finish_non_exhaustive()
    }
}

/// Bounded retry settings for `ConnectionManager::establish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_retries` is the total attempt budget and is clamped to at least 1.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            delay,
        }
    }

    pub fn from_secs(max_retries: u32, delay_secs: u64) -> Self {
        Self::new(max_retries, Duration::from_secs(delay_secs))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(5, 5)
    }
}

/// Observable connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Attempting { attempt: u32 },
    Connected,
    Failed { attempts: u32 },
}

/// Raised when every connection attempt failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to connect to `{target}` after {attempts} attempt(s): {source}")]
pub struct ConnectionError {
    pub target: String,
    pub attempts: u32,
    pub source: DbError,
}

/// Owns the single process-wide store connection.
///
/// Construct once at startup and pass the resulting `DbHandle` to the
/// components that need it.
#[derive(Debug)]
pub struct ConnectionManager {
    gate: Mutex<Option<DbHandle>>,
    state: Mutex<ConnectionState>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            gate: Mutex::new(None),
            state: Mutex::new(ConnectionState::Idle),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Cached handle, if a connection was established.
    pub fn handle(&self) -> Option<DbHandle> {
        lock(&self.gate).clone()
    }

    /// Connects to `locator`, retrying per `policy`.
    ///
    /// Each attempt parses the locator, opens the target and applies
    /// migrations. Once connected, later calls return the cached handle.
    ///
    /// # Errors
    /// - Returns `ConnectionError` wrapping the last failure once the attempt
    ///   budget is spent.
    pub fn establish(
        &self,
        locator: &str,
        policy: &RetryPolicy,
    ) -> Result<DbHandle, ConnectionError> {
        self.establish_with(locator, policy, |locator| {
            open_target(&StoreTarget::parse(locator)?)
        })
    }

    /// Same state machine as [`establish`](Self::establish) with an
    /// injectable connect function.
    pub fn establish_with<F>(
        &self,
        locator: &str,
        policy: &RetryPolicy,
        mut connect: F,
    ) -> Result<DbHandle, ConnectionError>
    where
        F: FnMut(&str) -> DbResult<Connection>,
    {
        let mut gate = lock(&self.gate);
        let host = describe_locator(locator);
        let max_attempts = policy.max_retries();
        let mut attempt: u32 = 0;

        loop {
            info!(
                "event=db_connect module=db status=attempt attempt={} max_attempts={} host={}",
                attempt + 1,
                max_attempts,
                host
            );

            if let Some(handle) = gate.as_ref() {
                self.set_state(ConnectionState::Connected);
                return Ok(handle.clone());
            }

            self.set_state(ConnectionState::Attempting {
                attempt: attempt + 1,
            });
            let failure = match connect(locator) {
                Ok(conn) => {
                    let handle = DbHandle::new(conn, host.clone());
                    *gate = Some(handle.clone());
                    self.set_state(ConnectionState::Connected);
                    info!(
                        "event=db_connect module=db status=ok attempt={} host={}",
                        attempt + 1,
                        host
                    );
                    return Ok(handle);
                }
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= max_attempts {
                self.set_state(ConnectionState::Failed { attempts: attempt });
                error!(
                    "event=db_connect module=db status=error attempts={} host={} error={}",
                    attempt, host, failure
                );
                return Err(ConnectionError {
                    target: host,
                    attempts: attempt,
                    source: failure,
                });
            }

            warn!(
                "event=db_connect module=db status=retry attempt={} retry_in_ms={} error={}",
                attempt,
                policy.delay().as_millis(),
                failure
            );
            thread::sleep(policy.delay());
        }
    }

    fn set_state(&self, next: ConnectionState) {
        *lock(&self.state) = next;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn describe_locator(locator: &str) -> String {
    StoreTarget::parse(locator)
        .map(|target| target.to_string())
        .unwrap_or_else(|_| locator.trim().to_string())
}
