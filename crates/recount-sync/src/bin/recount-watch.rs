//! # recount-watch
//!
//! Headless client for the open audit of a branch: loads it, expires stale
//! partial starts, follows revisions saved by other clients and logs
//! progress until Ctrl-C.
//!
//! ## Usage
//! ```bash
//! RECOUNT_BRANCH=12 cargo run -p recount-sync --bin recount-watch
//! cargo run -p recount-sync --bin recount-watch -- --config ./recount.toml
//! RUST_LOG=recount=trace cargo run -p recount-sync --bin recount-watch
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use recount_core::{branch_metrics, AuditSnapshot, Outcome, SessionStatus};
use recount_db::{Database, DbConfig};
use recount_sync::{AuditEventEmitter, AuditRuntime, RecountConfig, SyncError};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Logs every runtime event with the branch figures after it.
struct LogEmitter;

impl AuditEventEmitter for LogEmitter {
    fn emit_outcome(&self, outcome: &Outcome, snapshot: &AuditSnapshot) {
        let metrics = branch_metrics(snapshot);
        info!(
            ?outcome,
            done_categories = metrics.done_categories,
            total_categories = metrics.total_categories,
            progress = metrics.totals.progress_skus(),
            "Audit changed"
        );
    }

    fn emit_refreshed(&self, revision: i64) {
        info!(revision, "Picked up revision saved by another client");
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        error!(retryable, "{}", message);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: recount-watch [--config <PATH>]");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let config = RecountConfig::load(config_path)?;
    if config.branch().is_empty() {
        return Err(SyncError::InvalidConfig("store.branch is not configured (or set RECOUNT_BRANCH)".into()).into());
    }

    let db_path = config.database_path()?;
    info!(path = %db_path.display(), branch = %config.branch(), "Opening database");
    let db = Database::new(DbConfig::new(db_path)).await?;

    let session = match db.sessions().fetch_latest(config.branch()).await? {
        Some(session) if session.status == SessionStatus::Open => session,
        Some(session) => {
            info!(
                audit_number = session.audit_number,
                "Latest audit of this branch is already completed"
            );
            return Ok(());
        }
        None => {
            warn!(branch = %config.branch(), "No audit session for this branch. Run the seed first.");
            return Ok(());
        }
    };

    let runtime = AuditRuntime::open_with_emitter(&config, Arc::new(db), &session.id, Arc::new(LogEmitter)).await?;

    let metrics = runtime.metrics().await;
    info!(
        inventory_number = %session.snapshot.inventory_number,
        skus = metrics.totals.skus,
        units = metrics.totals.units,
        cost = %metrics.totals.cost,
        done_categories = metrics.done_categories,
        total_categories = metrics.total_categories,
        "Watching audit"
    );

    let handle = runtime.spawn_background();
    tokio::signal::ctrl_c().await?;
    handle.shutdown().await?;

    let status = runtime.status().await;
    info!(revision = status.revision, dirty = status.dirty, "Stopped");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=recount=trace` - Show trace for recount crates only
/// - Default: INFO level, debug for recount crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,recount=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
