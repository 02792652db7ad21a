//! Per-credential access flags (`access_db`).
//!
//! One row per credential; `data` holds a flag-name to bool map.

use super::row::RowReader;
use crate::codec::ColumnKind;
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::schema::TableSchema;
use crate::table::{Assignments, FieldSet, Row, TableController};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;

pub const TABLE_NAME: &str = "access_db";

const FIELDS: FieldSet<'static> = &[("cid", ColumnKind::Integer), ("data", ColumnKind::Map)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    /// Credential id.
    pub cid: i64,
    pub access: BTreeMap<String, bool>,
}

pub fn schema() -> StoreResult<TableSchema> {
    TableSchema::new(TABLE_NAME, ["cid INTEGER PRIMARY KEY", "data BLOB NOT NULL"])
}

pub struct AccessTable {
    table: TableController,
}

impl AccessTable {
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

    /// Queues a new row; missing `access` is stored as an empty map.
    pub fn create(&self, cid: i64, access: Option<&BTreeMap<String, bool>>) -> StoreResult<()> {
        self.table.insert(
            &Assignments::new()
                .integer("cid", cid)
                .map("data", access.map(flags_to_json).unwrap_or_default()),
        )
    }

    /// Replaces the flag map; `None` leaves the row untouched.
    pub fn update(&self, cid: i64, access: Option<&BTreeMap<String, bool>>) -> StoreResult<()> {
        let columns = match access {
            Some(flags) => Assignments::new().map("data", flags_to_json(flags)),
            None => Assignments::new(),
        };
        self.table.update("cid", cid, &columns)
    }

    pub fn delete(&self, cid: i64) -> StoreResult<()> {
        self.table.delete("cid", cid)
    }

    pub fn get(&self, cid: i64) -> StoreResult<Option<AccessRecord>> {
        self.table
            .get("cid", cid, FIELDS)?
            .map(parse_access_row)
            .transpose()
    }
}

fn parse_access_row(row: Row) -> StoreResult<AccessRecord> {
    let mut reader = RowReader::new(TABLE_NAME, row);
    Ok(AccessRecord {
        cid: reader.integer("cid")?,
        access: reader.flag_map("data")?,
    })
}

fn flags_to_json(flags: &BTreeMap<String, bool>) -> JsonMap<String, JsonValue> {
    flags
        .iter()
        .map(|(name, enabled)| (name.clone(), JsonValue::Bool(*enabled)))
        .collect()
}
