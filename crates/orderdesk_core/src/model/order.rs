//! Order document model.
//!
//! # Responsibility
//! - Keep the known fields (`id`, `status`, `date`) typed.
//! - Carry any caller-defined fields through an explicit extension map.
//!
//! # Invariants
//! - An empty `id` is equivalent to no `id`.
//! - The store never rewrites `id` after creation.
//! - `status`/`date` distinguish "absent" (`None`) from "supplied as null"
//!   (`Some(None)`) so an update can clear them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Short-code primary key of an order.
pub type OrderId = String;

/// Persisted order document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Accepted as `_id` too, to match document-store payloads.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderId>,
    /// Expected `active` or `completed`; only used for filtering.
    #[serde(
        default,
        deserialize_with = "supplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<Option<String>>,
    /// ISO calendar date (`YYYY-MM-DD`); only used for filtering.
    #[serde(
        default,
        deserialize_with = "supplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<Option<String>>,
    /// Caller-defined fields, passed through unexamined.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    pub fn new(status: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: None,
            status: Some(Some(status.into())),
            date: Some(Some(date.into())),
            extra: Map::new(),
        }
    }

    /// Builder-style helper for extension fields.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Non-empty id, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn has_id(&self) -> bool {
        self.id().is_some()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref()?.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_ref()?.as_deref()
    }
}

/// Present fields map to `Some`, so an explicit `null` becomes `Some(None)`.
fn supplied<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Order status values accepted by the status filter route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Active,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status selector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Supplied status `{0}` not valid, must be one of: [active or completed]")]
pub struct InvalidOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = InvalidOrderStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(InvalidOrderStatus(other.to_string())),
        }
    }
}
