//! # recount-sync: Session Runtime for Recount
//!
//! Keeps one audit session live on a client. The pure transitions of
//! `recount-core` are applied against a shared snapshot and persisted
//! through a [`SnapshotStore`]; a background loop picks up revisions saved
//! by other clients and expires stale partial starts at local midnight.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Runtime Architecture                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      AuditRuntime                                │  │
//! │  │                                                                  │  │
//! │  │  Arc<RwLock<session>>   apply(transition) → persist              │  │
//! │  │  Emits outcome / refresh / error events                          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ SnapshotStore  │  │ Background loop│  │   RecountConfig        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ SQLite via     │  │ refresh every  │  │ TOML + RECOUNT_* env   │    │
//! │  │ recount-db     │  │ N secs; expire │  │ actor, expiry policy,  │    │
//! │  │                │  │ at midnight    │  │ database path          │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`] - Runtime configuration (device, store, audit, database)
//! - [`error`] - Runtime error types
//! - [`runtime`] - `AuditRuntime` and its background loop
//! - [`store`] - `SnapshotStore` persistence seam
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use recount_core::ScopeRef;
//! use recount_db::{Database, DbConfig};
//! use recount_sync::{AuditRuntime, RecountConfig};
//!
//! let config = RecountConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(config.database_path()?)).await?;
//!
//! let runtime = AuditRuntime::open(&config, Arc::new(db), &session_id).await?;
//! let handle = runtime.spawn_background();
//!
//! runtime.start_partial(&ScopeRef::department("1", "10")).await?;
//! println!("Progress: {:.1}%", runtime.status().await.progress);
//!
//! handle.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod runtime;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AuditSettings, DatabaseSettings, DeviceConfig, RecountConfig, StoreConfig};
pub use error::{SyncError, SyncResult};
pub use runtime::{AuditEventEmitter, AuditRuntime, NoOpEmitter, RuntimeHandle, RuntimeStatus};
pub use store::SnapshotStore;
