//! HTTP surface for orderdesk.
//!
//! # Responsibility
//! - Expose order CRUD over JSON routes.
//! - Map core outcomes and errors onto HTTP status codes.
//!
//! # Invariants
//! - The router only holds an already established `DbHandle`.

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{create_router, AppState, SECRET_HEADER};

use log::info;
use std::future::Future;
use tokio::net::TcpListener;

/// Serves the order router on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!("event=http_listen module=http status=ok addr={addr}");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("event=http_stop module=http status=ok addr={addr}");
    Ok(())
}
