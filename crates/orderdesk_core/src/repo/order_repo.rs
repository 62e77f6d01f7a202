//! Order repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the order CRUD contract over the `orders` collection.
//! - Keep SQL and document encoding inside the persistence boundary.
//!
//! # Invariants
//! - Every order returned from a read path has a non-empty `id`.
//! - `id` is written once on insert and never rewritten.
//! - Zero-match outcomes are values (`None`, `0`, `NoMatch`), not errors.
//! - No operation here retries on failure.

use super::filter::OrderFilter;
use crate::db::DbError;
use crate::id::{IdGenerator, ShortCodeGenerator, DEFAULT_ID_LENGTH};
use crate::model::order::{Order, OrderId};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid persisted order data: {0}")]
    InvalidData(String),
    #[error("order document encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result of `create_or_update_order`.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Order had no id; a new id was generated and the order inserted.
    Created(Order),
    /// Order id matched a stored order; carries the merged document.
    Updated(Order),
    /// Order id matched nothing and upsert was allowed; inserted as given.
    Upserted(Order),
    /// Order id matched nothing and upsert was not allowed.
    NoMatch,
}

impl WriteOutcome {
    /// Number of pre-existing records the write matched (0 or 1).
    pub fn matched_count(&self) -> u64 {
        match self {
            Self::Updated(_) => 1,
            Self::Created(_) | Self::Upserted(_) | Self::NoMatch => 0,
        }
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::Created(order) | Self::Updated(order) | Self::Upserted(order) => Some(order),
            Self::NoMatch => None,
        }
    }

    pub fn into_order(self) -> Option<Order> {
        match self {
            Self::Created(order) | Self::Updated(order) | Self::Upserted(order) => Some(order),
            Self::NoMatch => None,
        }
    }
}

/// Repository interface for order CRUD operations.
pub trait OrderRepository {
    fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>>;
    fn get_order(&self, id: &str) -> StoreResult<Option<Order>>;
    fn delete_order(&self, id: &str) -> StoreResult<u64>;
    /// Inserts orders without an id and `$set`-updates orders with one.
    ///
    /// `allow_upsert_on_missing_id` is meant for data seeding only: it turns
    /// an unmatched update into an insert under the supplied id.
    fn create_or_update_order(
        &self,
        order: Order,
        allow_upsert_on_missing_id: bool,
    ) -> StoreResult<WriteOutcome>;
}

/// SQLite-backed order repository.
pub struct SqliteOrderRepository<'conn, G: IdGenerator = ShortCodeGenerator> {
    conn: &'conn Connection,
    ids: G,
}

impl<'conn> SqliteOrderRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_id_generator(conn, ShortCodeGenerator)
    }
}

impl<'conn, G: IdGenerator> SqliteOrderRepository<'conn, G> {
    pub fn with_id_generator(conn: &'conn Connection, ids: G) -> Self {
        Self { conn, ids }
    }
}

impl<G: IdGenerator> OrderRepository for SqliteOrderRepository<'_, G> {
    fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        let (clause, binds) = filter.to_sql()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, doc FROM orders WHERE {clause} ORDER BY rowid ASC"
        ))?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut orders = Vec::new();

        while let Some(row) = rows.next()? {
            orders.push(parse_order_row(row)?);
        }

        Ok(orders)
    }

    fn get_order(&self, id: &str) -> StoreResult<Option<Order>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, doc FROM orders WHERE id = ?1")?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_order_row(row)?));
        }

        Ok(None)
    }

    fn delete_order(&self, id: &str) -> StoreResult<u64> {
        let removed = self.conn.execute("DELETE FROM orders WHERE id = ?1", [id])?;
        Ok(removed as u64)
    }

    fn create_or_update_order(
        &self,
        mut order: Order,
        allow_upsert_on_missing_id: bool,
    ) -> StoreResult<WriteOutcome> {
        let Some(id) = order.id().map(str::to_owned) else {
            let id = self.ids.generate(DEFAULT_ID_LENGTH);
            order.id = Some(id.clone());
            insert_document(self.conn, &id, &to_document(&order)?)?;
            return Ok(WriteOutcome::Created(order));
        };

        let fields = to_document(&order)?;
        let tx = self.conn.unchecked_transaction()?;
        let existing: Option<String> = tx
            .query_row("SELECT doc FROM orders WHERE id = ?1", [&id], |row| {
                row.get(0)
            })
            .optional()?;

        let outcome = match existing {
            Some(doc) => {
                let mut merged = parse_document(&id, &doc)?;
                for (key, value) in fields {
                    merged.insert(key, value);
                }
                tx.execute(
                    "UPDATE orders
                     SET
                        doc = ?1,
                        updated_at = (strftime('%s', 'now') * 1000)
                     WHERE id = ?2",
                    params![serde_json::to_string(&merged)?, id],
                )?;
                WriteOutcome::Updated(order_from_document(id, merged)?)
            }
            None if allow_upsert_on_missing_id => {
                insert_document(&tx, &id, &fields)?;
                WriteOutcome::Upserted(order)
            }
            None => WriteOutcome::NoMatch,
        };
        tx.commit()?;

        Ok(outcome)
    }
}

fn insert_document(conn: &Connection, id: &str, doc: &Map<String, Value>) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO orders (id, doc) VALUES (?1, ?2)",
        params![id, serde_json::to_string(doc)?],
    )?;
    Ok(())
}

/// Document body of an order: every field except the key.
fn to_document(order: &Order) -> StoreResult<Map<String, Value>> {
    match serde_json::to_value(order)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(StoreError::InvalidData(format!(
            "order did not encode to an object: {other}"
        ))),
    }
}

fn parse_document(id: &str, doc: &str) -> StoreResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(doc) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err(StoreError::InvalidData(format!(
            "document of order `{id}` is not a JSON object"
        ))),
    }
}

fn order_from_document(id: OrderId, doc: Map<String, Value>) -> StoreResult<Order> {
    let mut order: Order = serde_json::from_value(Value::Object(doc))?;
    order.id = Some(id);
    Ok(order)
}

fn parse_order_row(row: &Row<'_>) -> StoreResult<Order> {
    let id: String = row.get("id")?;
    if id.is_empty() {
        return Err(StoreError::InvalidData(
            "empty id value in orders.id".to_string(),
        ));
    }
    let doc: String = row.get("doc")?;
    let map = parse_document(&id, &doc)?;
    order_from_document(id, map)
}
