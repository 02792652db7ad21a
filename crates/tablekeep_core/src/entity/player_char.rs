//! Player characters owned by a credential (`player_char_db`).
//!
//! `content_ids` is a list column holding content identifiers as strings.

use super::row::RowReader;
use crate::codec::ColumnKind;
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::schema::TableSchema;
use crate::table::{Assignments, FieldSet, ListQuery, Row, SortDirection, TableController};
use serde_json::Value as JsonValue;

pub const TABLE_NAME: &str = "player_char_db";

const FIELDS: FieldSet<'static> = &[
    ("uid", ColumnKind::Integer),
    ("cid", ColumnKind::Integer),
    ("name", ColumnKind::Text),
    ("discord_url", ColumnKind::Text),
    ("char_type", ColumnKind::Text),
    ("content_ids", ColumnKind::List),
    ("game_db_id", ColumnKind::Integer),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCharType {
    Lore,
    Norm,
}

impl PlayerCharType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lore => "lore",
            Self::Norm => "norm",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "lore" => Some(Self::Lore),
            "norm" => Some(Self::Norm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCharRecord {
    pub uid: i64,
    pub cid: i64,
    pub name: String,
    pub discord_url: Option<String>,
    pub char_type: PlayerCharType,
    pub content_ids: Vec<String>,
    pub game_db_id: Option<i64>,
}

/// Insert payload; `uid` is assigned by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayerChar {
    pub cid: i64,
    pub name: String,
    pub char_type: PlayerCharType,
    pub content_ids: Vec<String>,
    pub discord_url: Option<String>,
    pub game_db_id: Option<i64>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerCharPatch {
    pub name: Option<String>,
    pub discord_url: Option<String>,
    pub char_type: Option<PlayerCharType>,
    pub content_ids: Option<Vec<String>>,
    pub game_db_id: Option<i64>,
}

pub fn schema() -> StoreResult<TableSchema> {
    TableSchema::new(
        TABLE_NAME,
        [
            "uid INTEGER PRIMARY KEY AUTOINCREMENT",
            "cid INTEGER NOT NULL",
            "name TEXT NOT NULL",
            "discord_url TEXT",
            "char_type TEXT NOT NULL",
            "content_ids BLOB NOT NULL",
            "game_db_id INTEGER",
        ],
    )?
    .with_index("idx_player_char_db_cid", "cid")
}

pub struct PlayerCharTable {
    table: TableController,
}

impl PlayerCharTable {
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

    pub fn create(&self, character: &NewPlayerChar) -> StoreResult<()> {
        self.table.insert(
            &Assignments::new()
                .integer("cid", character.cid)
                .text("name", character.name.as_str())
                .set("discord_url", character.discord_url.clone(), ColumnKind::Text)
                .text("char_type", character.char_type.as_str())
                .list("content_ids", ids_to_json(&character.content_ids))
                .set("game_db_id", character.game_db_id, ColumnKind::Integer),
        )
    }

    pub fn update(&self, uid: i64, patch: &PlayerCharPatch) -> StoreResult<()> {
        let columns = Assignments::new()
            .set_if_some("name", patch.name.clone(), ColumnKind::Text)
            .set_if_some("discord_url", patch.discord_url.clone(), ColumnKind::Text)
            .set_if_some(
                "char_type",
                patch.char_type.map(PlayerCharType::as_str),
                ColumnKind::Text,
            )
            .set_if_some(
                "content_ids",
                patch.content_ids.as_deref().map(ids_to_json),
                ColumnKind::List,
            )
            .set_if_some("game_db_id", patch.game_db_id, ColumnKind::Integer);
        self.table.update("uid", uid, &columns)
    }

    pub fn delete(&self, uid: i64) -> StoreResult<()> {
        self.table.delete("uid", uid)
    }

    pub fn get(&self, uid: i64) -> StoreResult<Option<PlayerCharRecord>> {
        self.table
            .get("uid", uid, FIELDS)?
            .map(parse_player_char_row)
            .transpose()
    }

    /// Characters of one credential in creation order.
    pub fn list_by_owner(&self, cid: i64) -> StoreResult<Vec<PlayerCharRecord>> {
        let query = ListQuery::all()
            .filter_eq("cid", cid)
            .order_by("uid", SortDirection::Asc);
        self.table
            .list(FIELDS, &query)?
            .into_iter()
            .map(parse_player_char_row)
            .collect()
    }
}

fn ids_to_json(ids: &[String]) -> Vec<JsonValue> {
    ids.iter().cloned().map(JsonValue::String).collect()
}

fn parse_player_char_row(row: Row) -> StoreResult<PlayerCharRecord> {
    let mut reader = RowReader::new(TABLE_NAME, row);
    let char_type_label = reader.text("char_type")?;
    let char_type = PlayerCharType::parse(&char_type_label)
        .ok_or_else(|| reader.invalid_label("char_type", &char_type_label))?;

    Ok(PlayerCharRecord {
        uid: reader.integer("uid")?,
        cid: reader.integer("cid")?,
        name: reader.text("name")?,
        discord_url: reader.optional_text("discord_url")?,
        char_type,
        content_ids: reader.string_list("content_ids")?,
        game_db_id: reader.optional_integer("game_db_id")?,
    })
}
