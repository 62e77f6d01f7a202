//! orderdesk server entry point.
//!
//! # Responsibility
//! - Load settings, start logging and establish the store connection once.
//! - Run the HTTP server, or seed/list orders from the command line.

mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use orderdesk_core::{
    core_version, init_logging, ConnectionManager, DbHandle, LogSink, Order, OrderFilter,
    OrderService, SeedReport, SqliteOrderRepository,
};
use orderdesk_http::AppState;
use settings::Settings;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "orderdesk", version, about = "Order management backend")]
struct Cli {
    /// Connection locator; overrides ORDERDESK_DB.
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// Listen port; overrides ORDERDESK_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Load a JSON array of orders, upserting by id.
    Seed {
        file: PathBuf,
    },
    /// Print orders as JSON.
    List {
        /// Document-store style filter, e.g. '{"status": "active"}'.
        #[arg(long)]
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(db) = cli.db {
        settings.db_locator = db;
    }

    let sink = LogSink::from_dir(settings.log_dir.as_deref()).map_err(anyhow::Error::msg)?;
    init_logging(&settings.log_level, sink).map_err(anyhow::Error::msg)?;
    info!(
        "event=startup module=cli status=ok version={} config={:?}",
        core_version(),
        settings
    );

    let manager = ConnectionManager::new();
    let handle = manager
        .establish(&settings.db_locator, &settings.retry_policy())
        .context("store unavailable, refusing to start")?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(handle, &settings, port),
        Command::Seed { file } => seed(&handle, &file),
        Command::List { filter } => list(&handle, filter.as_deref()),
    }
}

fn serve(handle: DbHandle, settings: &Settings, port: Option<u16>) -> Result<()> {
    let addr = SocketAddr::new(settings.bind_addr, port.unwrap_or(settings.port));
    let state = AppState::new(handle, settings.secret.clone());
    if !state.secret_required() {
        warn!("event=secret_gate module=cli status=open reason=no_secret_configured");
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        orderdesk_http::serve(listener, state, shutdown_signal())
            .await
            .context("http server failed")
    })
}

fn seed(handle: &DbHandle, file: &Path) -> Result<()> {
    let report = seed_from_file(handle, file)?;
    println!(
        "seeded {} orders (created={} updated={} upserted={})",
        report.total(),
        report.created,
        report.updated,
        report.upserted
    );
    Ok(())
}

fn seed_from_file(handle: &DbHandle, file: &Path) -> Result<SeedReport> {
    let orders = load_seed_file(file)?;
    let report = handle.with_connection(|conn| {
        OrderService::new(SqliteOrderRepository::new(conn)).seed_orders(orders)
    })?;
    Ok(report)
}

/// Reads a JSON array of orders.
fn load_seed_file(file: &Path) -> Result<Vec<Order>> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read seed file `{}`", file.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("seed file `{}` is not a JSON array of orders", file.display()))
}

fn list(handle: &DbHandle, filter: Option<&str>) -> Result<()> {
    let filter = parse_filter(filter)?;
    let orders = handle.with_connection(|conn| {
        OrderService::new(SqliteOrderRepository::new(conn)).query_orders(&filter)
    })?;
    println!("{}", serde_json::to_string_pretty(&orders)?);
    Ok(())
}

/// Parses the `--filter` argument; no argument matches every order.
fn parse_filter(raw: Option<&str>) -> Result<OrderFilter> {
    let Some(raw) = raw else {
        return Ok(OrderFilter::all());
    };
    let value: serde_json::Value = serde_json::from_str(raw).context("filter is not valid JSON")?;
    Ok(OrderFilter::from_json(&value)?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("event=signal module=cli status=error signal=ctrl_c error={err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("event=signal module=cli status=error signal=sigterm error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("event=shutdown module=cli status=start signal=ctrl_c"),
        () = terminate => info!("event=shutdown module=cli status=start signal=sigterm"),
    }
}
