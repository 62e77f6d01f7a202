//! Order filter expressions and their SQL compilation.
//!
//! # Responsibility
//! - Model filters as a conjunction of `field <op> scalar` conditions.
//! - Parse document-store style JSON filters (`{"date": {"$lt": ...}}`).
//! - Compile filters into a parameterized `WHERE` clause over `orders`.
//!
//! # Invariants
//! - Field names are validated before they reach SQL text.
//! - Values are always bound as parameters, never interpolated.

use super::order_repo::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

static FIELD_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("field name pattern is valid")
});

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    fn from_operator(op: &str) -> Option<Self> {
        match op {
            "$eq" => Some(Self::Eq),
            "$ne" => Some(Self::Ne),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

/// Single `field <op> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Comparison,
    pub value: Value,
}

/// Conjunction of conditions; the empty filter matches every order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    conditions: Vec<Condition>,
}

impl OrderFilter {
    /// Filter matching every order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_field(
        mut self,
        field: impl Into<String>,
        op: Comparison,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.by_field(field, Comparison::Eq, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.by_field(field, Comparison::Lt, value)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parses a document-store style filter object.
    ///
    /// Supported shapes: `{"field": scalar}`, `{"field": {"$op": scalar, ..}}`
    /// and `{"$and": [filter, ..]}`, nested freely.
    ///
    /// # Errors
    /// - Returns `StoreError::InvalidFilter` for non-object filters, unknown
    ///   operators and non-scalar values.
    pub fn from_json(value: &Value) -> StoreResult<Self> {
        let mut filter = Self::all();
        collect_conditions(value, &mut filter.conditions)?;
        Ok(filter)
    }

    /// Compiles the filter into a `WHERE` clause body and bound values.
    pub(crate) fn to_sql(&self) -> StoreResult<(String, Vec<SqlValue>)> {
        if self.conditions.is_empty() {
            return Ok(("1 = 1".to_string(), Vec::new()));
        }

        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut binds = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            let column = column_expr(&condition.field)?;
            let bound = scalar_to_sql(&condition.field, &condition.value)?;
            match (condition.op, bound) {
                (Comparison::Eq, SqlValue::Null) => clauses.push(format!("{column} IS NULL")),
                (Comparison::Ne, SqlValue::Null) => clauses.push(format!("{column} IS NOT NULL")),
                (_, SqlValue::Null) => {
                    return Err(StoreError::InvalidFilter(format!(
                        "field `{}` cannot be ordered against null",
                        condition.field
                    )));
                }
                // Documents lacking the field still differ from the operand.
                (Comparison::Ne, bound) => {
                    clauses.push(format!("({column} IS NULL OR {column} <> ?)"));
                    binds.push(bound);
                }
                (op, bound) => {
                    clauses.push(format!("{column} {} ?", op.sql()));
                    binds.push(bound);
                }
            }
        }

        Ok((clauses.join(" AND "), binds))
    }
}

fn collect_conditions(value: &Value, out: &mut Vec<Condition>) -> StoreResult<()> {
    let object = value.as_object().ok_or_else(|| {
        StoreError::InvalidFilter(format!("filter must be a JSON object, got `{value}`"))
    })?;

    for (key, value) in object {
        if key == "$and" {
            let parts = value.as_array().ok_or_else(|| {
                StoreError::InvalidFilter("`$and` expects an array of filters".to_string())
            })?;
            for part in parts {
                collect_conditions(part, out)?;
            }
            continue;
        }
        if key.starts_with('$') {
            return Err(StoreError::InvalidFilter(format!(
                "unsupported top-level operator `{key}`"
            )));
        }

        match value {
            Value::Object(operators) if is_operator_object(operators) => {
                for (op, operand) in operators {
                    let op = Comparison::from_operator(op).ok_or_else(|| {
                        StoreError::InvalidFilter(format!(
                            "unsupported operator `{op}` on field `{key}`"
                        ))
                    })?;
                    out.push(Condition {
                        field: key.clone(),
                        op,
                        value: operand.clone(),
                    });
                }
            }
            other => out.push(Condition {
                field: key.clone(),
                op: Comparison::Eq,
                value: other.clone(),
            }),
        }
    }

    Ok(())
}

fn is_operator_object(object: &Map<String, Value>) -> bool {
    !object.is_empty() && object.keys().all(|key| key.starts_with('$'))
}

fn column_expr(field: &str) -> StoreResult<String> {
    if field == "id" || field == "_id" {
        return Ok("id".to_string());
    }
    if !FIELD_NAME.is_match(field) {
        return Err(StoreError::InvalidFilter(format!(
            "invalid field name `{field}`"
        )));
    }
    Ok(format!("json_extract(doc, '$.{field}')"))
}

fn scalar_to_sql(field: &str, value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Ok(SqlValue::Integer(int))
            } else if let Some(real) = number.as_f64() {
                Ok(SqlValue::Real(real))
            } else {
                Err(StoreError::InvalidFilter(format!(
                    "numeric value for field `{field}` is out of range"
                )))
            }
        }
        Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidFilter(format!(
            "field `{field}` must be compared against a scalar value"
        ))),
    }
}
