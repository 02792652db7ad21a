//! Time-bounded limit grants (`timed_limit`).
//!
//! Each row adds character slots and storage weight to a credential until
//! `expired` (unix seconds). Deciding what is currently in effect is left to
//! the caller.

use super::row::RowReader;
use crate::codec::ColumnKind;
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::schema::TableSchema;
use crate::table::{Assignments, FieldSet, ListQuery, Row, SortDirection, TableController};

pub const TABLE_NAME: &str = "timed_limit";

const FIELDS: FieldSet<'static> = &[
    ("uid", ColumnKind::Integer),
    ("cid", ColumnKind::Integer),
    ("char_slot", ColumnKind::Integer),
    ("weight_bytes", ColumnKind::Integer),
    ("expired", ColumnKind::Integer),
    ("status", ColumnKind::Text),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimedLimitStatus {
    #[default]
    Active,
    Expired,
    Disabled,
}

impl TimedLimitStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedLimitRecord {
    pub uid: i64,
    pub cid: i64,
    pub char_slot: i64,
    pub weight_bytes: i64,
    pub expired: i64,
    pub status: TimedLimitStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimedLimit {
    pub cid: i64,
    pub char_slot: i64,
    pub weight_bytes: i64,
    pub expired: i64,
    pub status: TimedLimitStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimedLimitPatch {
    pub char_slot: Option<i64>,
    pub weight_bytes: Option<i64>,
    pub expired: Option<i64>,
    pub status: Option<TimedLimitStatus>,
}

pub fn schema() -> StoreResult<TableSchema> {
    TableSchema::new(
        TABLE_NAME,
        [
            "uid INTEGER PRIMARY KEY AUTOINCREMENT",
            "cid INTEGER NOT NULL",
            "char_slot INTEGER NOT NULL DEFAULT 0",
            "weight_bytes INTEGER NOT NULL DEFAULT 0",
            "expired INTEGER NOT NULL",
            "status TEXT NOT NULL",
        ],
    )?
    .with_index("idx_timed_limit_cid", "cid")?
    .with_index("idx_timed_limit_expired", "expired")
}

pub struct TimedLimitTable {
    table: TableController,
}

impl TimedLimitTable {
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

    pub fn create(&self, limit: &NewTimedLimit) -> StoreResult<()> {
        self.table.insert(
            &Assignments::new()
                .integer("cid", limit.cid)
                .integer("char_slot", limit.char_slot)
                .integer("weight_bytes", limit.weight_bytes)
                .integer("expired", limit.expired)
                .text("status", limit.status.as_str()),
        )
    }

    pub fn update(&self, uid: i64, patch: &TimedLimitPatch) -> StoreResult<()> {
        let columns = Assignments::new()
            .set_if_some("char_slot", patch.char_slot, ColumnKind::Integer)
            .set_if_some("weight_bytes", patch.weight_bytes, ColumnKind::Integer)
            .set_if_some("expired", patch.expired, ColumnKind::Integer)
            .set_if_some(
                "status",
                patch.status.map(TimedLimitStatus::as_str),
                ColumnKind::Text,
            );
        self.table.update("uid", uid, &columns)
    }

    pub fn delete(&self, uid: i64) -> StoreResult<()> {
        self.table.delete("uid", uid)
    }

    pub fn get(&self, uid: i64) -> StoreResult<Option<TimedLimitRecord>> {
        self.table
            .get("uid", uid, FIELDS)?
            .map(parse_timed_limit_row)
            .transpose()
    }

    /// Grants of one credential, soonest expiry first.
    pub fn list_by_owner(&self, cid: i64) -> StoreResult<Vec<TimedLimitRecord>> {
        let query = ListQuery::all()
            .filter_eq("cid", cid)
            .order_by("expired", SortDirection::Asc);
        self.table
            .list(FIELDS, &query)?
            .into_iter()
            .map(parse_timed_limit_row)
            .collect()
    }
}

fn parse_timed_limit_row(row: Row) -> StoreResult<TimedLimitRecord> {
    let mut reader = RowReader::new(TABLE_NAME, row);
    let status_label = reader.text("status")?;
    let status = TimedLimitStatus::parse(&status_label)
        .ok_or_else(|| reader.invalid_label("status", &status_label))?;

    Ok(TimedLimitRecord {
        uid: reader.integer("uid")?,
        cid: reader.integer("cid")?,
        char_slot: reader.integer("char_slot")?,
        weight_bytes: reader.integer("weight_bytes")?,
        expired: reader.integer("expired")?,
        status,
    })
}
