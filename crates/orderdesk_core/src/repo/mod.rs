//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the order data access contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs report zero matches as values, and transport or data
//!   failures as `StoreError`.

pub mod filter;
pub mod order_repo;
