//! Core data access for orderdesk.
//! This crate owns the connection lifecycle and the order CRUD contract.

pub mod db;
pub mod id;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{ConnectionError, ConnectionManager, ConnectionState, DbError, DbHandle, RetryPolicy};
pub use id::{generate_short_code, IdGenerator, ShortCodeGenerator, DEFAULT_ID_LENGTH};
pub use logging::{default_log_level, init_logging, logging_status, LogSink};
pub use model::order::{InvalidOrderStatus, Order, OrderId, OrderStatus};
pub use repo::filter::{Comparison, Condition, OrderFilter};
pub use repo::order_repo::{
    OrderRepository, SqliteOrderRepository, StoreError, StoreResult, WriteOutcome,
};
pub use service::order_service::{InvalidTimeWindow, OrderService, SeedReport, TimeWindow};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
