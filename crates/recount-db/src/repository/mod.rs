//! # Repository Module
//!
//! Database repository implementations for Recount.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AuditRuntime (recount-sync)                                           │
//! │       │                                                                 │
//! │       │  db.sessions().save(&session)                                  │
//! │       ▼                                                                 │
//! │  SessionRepository                                                     │
//! │  ├── create(&self, branch, number, snapshot)                           │
//! │  ├── get_by_id / get(&self, id)                                        │
//! │  ├── fetch_latest / latest_number(&self, branch)                       │
//! │  ├── save(&self, session)        → new revision                        │
//! │  └── revision(&self, id)         → cheap refresh check                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (audit_sessions)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod session;
