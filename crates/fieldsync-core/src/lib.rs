//! fieldsync-core - Core library for fieldsync
//!
//! Offline-first replication between a local `SQLite` store and the remote
//! time-tracking API: record models with sync metadata, the bidirectional
//! sync orchestrator, conflict resolution, progress broadcasting and the
//! connection mode state machine.

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::EngineConfig;
pub use connection::{ConnectionMode, ConnectionModeManager, ModeListener};
pub use error::{Error, Result};
pub use models::{LocalId, RecordKind, ServerId, SyncStatus};
pub use services::DatabaseService;
pub use sync::{SyncEngine, SyncError, SyncEvent, SyncKind, SyncResult};
