//! Table-per-file SQLite persistence core.
//!
//! Each table lives in its own database file. Writes to a table are queued
//! and applied in submission order by one worker thread; reads open their own
//! short-lived connection and never wait on the queue.

pub mod codec;
pub mod command;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod logging;
pub mod schema;
pub mod table;
pub mod writer;

pub use codec::{pack, unpack, CodecError, ColumnKind, FieldValue};
pub use command::Command;
pub use config::{ConfigError, JournalMode, StoreConfig, SyncMode};
pub use db::{DbError, DbResult};
pub use entity::{bootstrap_all, EntityTables};
pub use error::{StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use schema::{validate_identifier, IndexDef, TableSchema};
pub use table::{Assignments, FieldSet, ListQuery, Row, SortDirection, TableController};
pub use writer::{WorkerState, WriteQueue, WriteSerializer, WriterStats};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
