//! Order use-case service.
//!
//! # Responsibility
//! - Provide stable CRUD entry points for route and CLI callers.
//! - Translate status/time selectors into store filters.
//! - Own the seeding path, the only caller of upsert mode.
//!
//! # Invariants
//! - Service APIs never bypass repository persistence contracts.
//! - Ordinary updates never upsert.

use crate::model::order::{Order, OrderStatus};
use crate::repo::filter::OrderFilter;
use crate::repo::order_repo::{OrderRepository, StoreResult, WriteOutcome};
use chrono::NaiveDate;
use log::info;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Date window selector for time-filtered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// `date` equals the current date.
    Today,
    /// `date` is strictly before the current date.
    Past,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Past => "past",
        }
    }

    /// Store filter for this window relative to `today`.
    pub fn filter(&self, today: NaiveDate) -> OrderFilter {
        let today = today.format("%Y-%m-%d").to_string();
        match self {
            Self::Today => OrderFilter::all().eq("date", today),
            Self::Past => OrderFilter::all().lt("date", today),
        }
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Supplied time `{0}` not valid, must be one of: [today or past]")]
pub struct InvalidTimeWindow(pub String);

impl FromStr for TimeWindow {
    type Err = InvalidTimeWindow;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "today" => Ok(Self::Today),
            "past" => Ok(Self::Past),
            other => Err(InvalidTimeWindow(other.to_string())),
        }
    }
}

/// Counts of a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub updated: usize,
    pub upserted: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.upserted
    }
}

/// Use-case service wrapper for order operations.
pub struct OrderService<R: OrderRepository> {
    repo: R,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        self.repo.query_orders(filter)
    }

    pub fn all_orders(&self) -> StoreResult<Vec<Order>> {
        self.repo.query_orders(&OrderFilter::all())
    }

    pub fn orders_with_status(&self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        self.repo
            .query_orders(&OrderFilter::all().eq("status", status.as_str()))
    }

    pub fn orders_in_window(
        &self,
        window: TimeWindow,
        today: NaiveDate,
    ) -> StoreResult<Vec<Order>> {
        self.repo.query_orders(&window.filter(today))
    }

    pub fn get_order(&self, id: &str) -> StoreResult<Option<Order>> {
        self.repo.get_order(id)
    }

    /// Returns the number of removed orders (0 or 1).
    pub fn delete_order(&self, id: &str) -> StoreResult<u64> {
        self.repo.delete_order(id)
    }

    /// Inserts or `$set`-updates depending on whether `order` carries an id.
    pub fn create_or_update_order(
        &self,
        order: Order,
        allow_upsert_on_missing_id: bool,
    ) -> StoreResult<WriteOutcome> {
        self.repo.create_or_update_order(order, allow_upsert_on_missing_id)
    }

    /// Updates the order matching `order.id`; unmatched ids yield `NoMatch`.
    pub fn update_order(&self, order: Order) -> StoreResult<WriteOutcome> {
        self.repo.create_or_update_order(order, false)
    }

    /// Writes every order with upsert enabled, keeping supplied ids.
    ///
    /// Stops at the first failure; earlier writes stay applied.
    pub fn seed_orders(
        &self,
        orders: impl IntoIterator<Item = Order>,
    ) -> StoreResult<SeedReport> {
        let mut report = SeedReport::default();
        for order in orders {
            match self.repo.create_or_update_order(order, true)? {
                WriteOutcome::Created(_) => report.created += 1,
                WriteOutcome::Updated(_) => report.updated += 1,
                WriteOutcome::Upserted(_) => report.upserted += 1,
                WriteOutcome::NoMatch => {}
            }
        }

        info!(
            "event=seed_orders module=service status=ok created={} updated={} upserted={}",
            report.created, report.updated, report.upserted
        );
        Ok(report)
    }
}
