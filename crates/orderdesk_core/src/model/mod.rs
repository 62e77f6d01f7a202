//! Order domain model.
//!
//! # Responsibility
//! - Define the order document shape shared by store, service and HTTP.
//! - Provide typed selectors for the status filter.
//!
//! # Invariants
//! - Every stored order carries a non-empty `id`, assigned once.
//! - `status` and `date` values are not validated by the store.

pub mod order;
