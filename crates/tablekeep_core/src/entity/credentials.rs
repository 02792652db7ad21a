//! Account credentials (`credentials_db`).
//!
//! `id` is the anchor every other table refers to as `cid`. Rows start
//! `dirty` until an external sync clears the flag.

use super::row::RowReader;
use crate::codec::ColumnKind;
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::schema::TableSchema;
use crate::table::{Assignments, FieldSet, Row, TableController};

pub const TABLE_NAME: &str = "credentials_db";

const FIELDS: FieldSet<'static> = &[
    ("id", ColumnKind::Integer),
    ("discord_id", ColumnKind::Text),
    ("steam64_id", ColumnKind::Text),
    ("dirty", ColumnKind::Boolean),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsRecord {
    pub id: i64,
    pub discord_id: String,
    pub steam64_id: Option<String>,
    /// Not yet synchronized with downstream systems.
    pub dirty: bool,
}

pub fn schema() -> StoreResult<TableSchema> {
    TableSchema::new(
        TABLE_NAME,
        [
            "id INTEGER PRIMARY KEY AUTOINCREMENT",
            "discord_id TEXT NOT NULL UNIQUE",
            "steam64_id TEXT",
            "dirty INTEGER NOT NULL DEFAULT 1",
        ],
    )
}

pub struct CredentialsTable {
    table: TableController,
}

impl CredentialsTable {
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        Ok(Self::from_controller(TableController::open(config, schema()?)?))
    }

    pub fn from_controller(table: TableController) -> Self {
        Self { table }
    }

    pub fn controller(&self) -> &TableController {
        &self.table
    }

    pub fn bootstrap(&self) -> StoreResult<()> {
        self.table.bootstrap()
    }

    /// Queues a new credential. A duplicate `discord_id` is rejected by the
    /// unique constraint and only shows up in the writer failure log.
    pub fn create(&self, discord_id: &str, steam64_id: Option<&str>) -> StoreResult<()> {
        self.table.insert(
            &Assignments::new()
                .text("discord_id", discord_id)
                .set("steam64_id", steam64_id, ColumnKind::Text),
        )
    }

    /// Changes the provided identifiers; `None` keeps the stored value.
    pub fn update(
        &self,
        id: i64,
        discord_id: Option<&str>,
        steam64_id: Option<&str>,
    ) -> StoreResult<()> {
        self.table.update(
            "id",
            id,
            &Assignments::new()
                .set_if_some("discord_id", discord_id, ColumnKind::Text)
                .set_if_some("steam64_id", steam64_id, ColumnKind::Text),
        )
    }

    pub fn delete(&self, id: i64) -> StoreResult<()> {
        self.table.delete("id", id)
    }

    pub fn get_by_id(&self, id: i64) -> StoreResult<Option<CredentialsRecord>> {
        self.get_by("id", id.into())
    }

    pub fn get_by_discord(&self, discord_id: &str) -> StoreResult<Option<CredentialsRecord>> {
        self.get_by("discord_id", discord_id.to_string().into())
    }

    pub fn get_by_steam(&self, steam64_id: &str) -> StoreResult<Option<CredentialsRecord>> {
        self.get_by("steam64_id", steam64_id.to_string().into())
    }

    pub fn set_dirty(&self, id: i64) -> StoreResult<()> {
        self.table.update("id", id, &Assignments::new().boolean("dirty", true))
    }

    pub fn clear_dirty(&self, id: i64) -> StoreResult<()> {
        self.table.update("id", id, &Assignments::new().boolean("dirty", false))
    }

    fn get_by(
        &self,
        column: &str,
        value: rusqlite::types::Value,
    ) -> StoreResult<Option<CredentialsRecord>> {
        self.table
            .get(column, value, FIELDS)?
            .map(parse_credentials_row)
            .transpose()
    }
}

fn parse_credentials_row(row: Row) -> StoreResult<CredentialsRecord> {
    let mut reader = RowReader::new(TABLE_NAME, row);
    Ok(CredentialsRecord {
        id: reader.integer("id")?,
        discord_id: reader.text("discord_id")?,
        steam64_id: reader.optional_text("steam64_id")?,
        dirty: reader.boolean("dirty")?,
    })
}
