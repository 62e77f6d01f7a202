//! Order routes.
//!
//! # Responsibility
//! - Parse paths and bodies, gate mutations on the shared secret.
//! - Call `OrderService` on the blocking pool and map outcomes to statuses.
//!
//! # Invariants
//! - Handlers never touch SQLite directly; every store call goes through
//!   `OrderService` on `spawn_blocking`.
//! - The secret check runs before any id validation on mutating routes.

use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use log::info;
use orderdesk_core::{
    DbHandle, Order, OrderService, OrderStatus, SqliteOrderRepository, StoreResult, TimeWindow,
    WriteOutcome,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Header carrying the shared secret on mutating routes.
pub const SECRET_HEADER: &str = "x-secret";

/// Shared state for the order routes.
#[derive(Clone)]
pub struct AppState {
    db: DbHandle,
    secret: Option<Arc<str>>,
    clock: fn() -> NaiveDate,
}

impl AppState {
    /// `secret = None` leaves mutating routes open.
    pub fn new(db: DbHandle, secret: Option<String>) -> Self {
        Self {
            db,
            secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
            clock: utc_today,
        }
    }

    /// Replaces the source of "today" for time-filtered queries.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn secret_required(&self) -> bool {
        self.secret.is_some()
    }
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Creates the router with all order endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/orders",
            get(list_orders).post(create_order).put(update_order),
        )
        .route("/orders/status/{status}", get(orders_by_status))
        .route("/orders/time/{time}", get(orders_by_time))
        .route("/orders/{id}", get(get_order).delete(delete_order))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = run_service(&state, |service| service.all_orders()).await?;
    Ok(Json(orders))
}

async fn orders_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let status: OrderStatus = status
        .parse()
        .map_err(|err: orderdesk_core::InvalidOrderStatus| ApiError::BadRequest(err.to_string()))?;
    let orders = run_service(&state, move |service| service.orders_with_status(status)).await?;
    Ok(Json(orders))
}

async fn orders_by_time(
    State(state): State<AppState>,
    Path(time): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let window: TimeWindow = time
        .parse()
        .map_err(|err: orderdesk_core::InvalidTimeWindow| ApiError::BadRequest(err.to_string()))?;
    let today = (state.clock)();
    let orders =
        run_service(&state, move |service| service.orders_in_window(window, today)).await?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let lookup = id.clone();
    match run_service(&state, move |service| service.get_order(&lookup)).await? {
        Some(order) => Ok(Json(order)),
        None => Err(ApiError::NotFound(format!("Order with id '{id}' not found"))),
    }
}

async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(order): Json<Order>,
) -> Result<Json<Order>, ApiError> {
    verify_secret(&state, &headers)?;
    if order.has_id() {
        return Err(ApiError::BadRequest(
            "Should not POST orders with id".to_string(),
        ));
    }

    let outcome =
        run_service(&state, move |service| service.create_or_update_order(order, false)).await?;
    let created = outcome
        .into_order()
        .ok_or_else(|| ApiError::Internal("insert reported no order".to_string()))?;
    info!(
        "event=order_create module=http status=ok id={}",
        created.id().unwrap_or_default()
    );
    Ok(Json(created))
}

async fn update_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(order): Json<Order>,
) -> Result<Json<Order>, ApiError> {
    verify_secret(&state, &headers)?;
    let Some(id) = order.id().map(str::to_owned) else {
        return Err(ApiError::BadRequest(
            "Should not PUT orders without id".to_string(),
        ));
    };

    let submitted = order.clone();
    match run_service(&state, move |service| service.update_order(order)).await? {
        WriteOutcome::NoMatch => Err(ApiError::NotFound(format!(
            "No order with id {id} found to modify"
        ))),
        _ => {
            info!("event=order_update module=http status=ok id={id}");
            Ok(Json(submitted))
        }
    }
}

async fn delete_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    verify_secret(&state, &headers)?;
    let target = id.clone();
    let removed = run_service(&state, move |service| service.delete_order(&target)).await?;
    if removed == 0 {
        return Err(ApiError::NotFound(format!(
            "No order with id {id} found to delete"
        )));
    }

    info!("event=order_delete module=http status=ok id={id}");
    Ok(Json(json!({ "msg": format!("Deleted doc {id} ok") })))
}

fn verify_secret(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.secret.as_deref() else {
        return Ok(());
    };
    match headers.get(SECRET_HEADER).and_then(|value| value.to_str().ok()) {
        Some(supplied) if supplied == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Runs one service call against the shared connection on the blocking pool.
async fn run_service<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: for<'c> FnOnce(&OrderService<SqliteOrderRepository<'c>>) -> StoreResult<T>
        + Send
        + 'static,
{
    let db = state.db.clone();
    let result = tokio::task::spawn_blocking(move || {
        db.with_connection(|conn| op(&OrderService::new(SqliteOrderRepository::new(conn))))
    })
    .await
    .map_err(|err| ApiError::Internal(format!("store task failed: {err}")))?;

    result.map_err(ApiError::from)
}
