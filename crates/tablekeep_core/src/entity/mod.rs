//! Entity tables built on the generic table controller.
//!
//! # Responsibility
//! - Declare each entity's schema and read field kinds.
//! - Offer typed create/update/get/list wrappers over `TableController`.
//!
//! # Invariants
//! - Entity code never opens connections or builds SQL itself.
//! - Partial updates with nothing to change produce no write.
//! - Entity rules (slot limits, discounts, ...) live above this layer.

pub mod access;
pub mod credentials;
pub mod note;
pub mod player_char;
mod row;
pub mod timed_limit;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use log::info;

pub use access::{AccessRecord, AccessTable};
pub use credentials::{CredentialsRecord, CredentialsTable};
pub use note::{NoteRecord, NoteTable};
pub use player_char::{
    NewPlayerChar, PlayerCharPatch, PlayerCharRecord, PlayerCharTable, PlayerCharType,
};
pub use timed_limit::{
    NewTimedLimit, TimedLimitPatch, TimedLimitRecord, TimedLimitStatus, TimedLimitTable,
};

/// Every entity table, opened and bootstrapped.
pub struct EntityTables {
    pub access: AccessTable,
    pub credentials: CredentialsTable,
    pub notes: NoteTable,
    pub player_chars: PlayerCharTable,
    pub timed_limits: TimedLimitTable,
}

impl EntityTables {
    /// Table names in bootstrap order.
    pub fn table_names(&self) -> [&str; 5] {
        [
            self.access.controller().name(),
            self.credentials.controller().name(),
            self.notes.controller().name(),
            self.player_chars.controller().name(),
            self.timed_limits.controller().name(),
        ]
    }

    /// Waits for every table's queued writes to be processed.
    pub fn flush_all(&self) -> StoreResult<()> {
        self.access.controller().flush()?;
        self.credentials.controller().flush()?;
        self.notes.controller().flush()?;
        self.player_chars.controller().flush()?;
        self.timed_limits.controller().flush()?;
        Ok(())
    }
}

/// Opens every entity table under `config` and bootstraps its schema.
///
/// Must complete before the process serves any request; the first failure
/// aborts start-up.
pub fn bootstrap_all(config: &StoreConfig) -> StoreResult<EntityTables> {
    let tables = EntityTables {
        access: AccessTable::open(config)?,
        credentials: CredentialsTable::open(config)?,
        notes: NoteTable::open(config)?,
        player_chars: PlayerCharTable::open(config)?,
        timed_limits: TimedLimitTable::open(config)?,
    };

    tables.access.bootstrap()?;
    tables.credentials.bootstrap()?;
    tables.notes.bootstrap()?;
    tables.player_chars.bootstrap()?;
    tables.timed_limits.bootstrap()?;

    info!(
        "event=entity_bootstrap module=entity status=ok tables={} data_dir={}",
        tables.table_names().len(),
        config.data_dir.display()
    );
    Ok(tables)
}
