//! Free-form administrative notes attached to a credential (`note_db`).

use super::row::RowReader;
use crate::codec::ColumnKind;
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::schema::TableSchema;
use crate::table::{Assignments, FieldSet, ListQuery, Row, SortDirection, TableController};

pub const TABLE_NAME: &str = "note_db";

const FIELDS: FieldSet<'static> = &[
    ("uid", ColumnKind::Integer),
    ("cid", ColumnKind::Integer),
    ("type", ColumnKind::Text),
    ("msg", ColumnKind::Text),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub uid: i64,
    pub cid: i64,
    /// Caller-defined category, stored in the `type` column.
    pub kind: String,
    pub msg: String,
}

pub fn schema() -> StoreResult<TableSchema> {
    TableSchema::new(
        TABLE_NAME,
        [
            "uid INTEGER PRIMARY KEY AUTOINCREMENT",
            "cid INTEGER NOT NULL",
            "type TEXT NOT NULL",
            "msg TEXT NOT NULL",
        ],
    )?
    .with_index("idx_note_db_cid", "cid")
}

pub struct NoteTable {
    table: TableController,
}

impl NoteTable {
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

    pub fn create(&self, cid: i64, kind: &str, msg: &str) -> StoreResult<()> {
        self.table.insert(
            &Assignments::new()
                .integer("cid", cid)
                .text("type", kind)
                .text("msg", msg),
        )
    }

    pub fn delete(&self, uid: i64) -> StoreResult<()> {
        self.table.delete("uid", uid)
    }

    pub fn get(&self, uid: i64) -> StoreResult<Option<NoteRecord>> {
        self.table
            .get("uid", uid, FIELDS)?
            .map(parse_note_row)
            .transpose()
    }

    /// Notes for one credential, oldest first.
    pub fn list_by_owner(&self, cid: i64) -> StoreResult<Vec<NoteRecord>> {
        let query = ListQuery::all()
            .filter_eq("cid", cid)
            .order_by("uid", SortDirection::Asc);
        self.table
            .list(FIELDS, &query)?
            .into_iter()
            .map(parse_note_row)
            .collect()
    }
}

fn parse_note_row(row: Row) -> StoreResult<NoteRecord> {
    let mut reader = RowReader::new(TABLE_NAME, row);
    Ok(NoteRecord {
        uid: reader.integer("uid")?,
        cid: reader.integer("cid")?,
        kind: reader.text("type")?,
        msg: reader.text("msg")?,
    })
}
