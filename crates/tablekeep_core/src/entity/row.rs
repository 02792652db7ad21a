//! Typed extraction from decoded rows.
//!
//! A field whose decoded value does not fit the record type is reported as a
//! decoding failure on that column.

use crate::codec::{CodecError, ColumnKind, FieldValue};
use crate::error::{StoreError, StoreResult};
use crate::table::Row;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;

pub(crate) struct RowReader<'a> {
    table: &'a str,
    row: Row,
}

impl<'a> RowReader<'a> {
    pub(crate) fn new(table: &'a str, row: Row) -> Self {
        Self { table, row }
    }

    pub(crate) fn integer(&mut self, column: &str) -> StoreResult<i64> {
        match self.take(column) {
            FieldValue::Integer(value) => Ok(value),
            other => Err(self.mismatch(column, ColumnKind::Integer, &other)),
        }
    }

    pub(crate) fn optional_integer(&mut self, column: &str) -> StoreResult<Option<i64>> {
        match self.take(column) {
            FieldValue::Null => Ok(None),
            FieldValue::Integer(value) => Ok(Some(value)),
            other => Err(self.mismatch(column, ColumnKind::Integer, &other)),
        }
    }

    pub(crate) fn text(&mut self, column: &str) -> StoreResult<String> {
        match self.take(column) {
            FieldValue::Text(value) => Ok(value),
            other => Err(self.mismatch(column, ColumnKind::Text, &other)),
        }
    }

    pub(crate) fn optional_text(&mut self, column: &str) -> StoreResult<Option<String>> {
        match self.take(column) {
            FieldValue::Null => Ok(None),
            FieldValue::Text(value) => Ok(Some(value)),
            other => Err(self.mismatch(column, ColumnKind::Text, &other)),
        }
    }

    pub(crate) fn boolean(&mut self, column: &str) -> StoreResult<bool> {
        match self.take(column) {
            FieldValue::Boolean(value) => Ok(value),
            other => Err(self.mismatch(column, ColumnKind::Boolean, &other)),
        }
    }

    pub(crate) fn list(&mut self, column: &str) -> StoreResult<Vec<JsonValue>> {
        match self.take(column) {
            FieldValue::List(items) => Ok(items),
            other => Err(self.mismatch(column, ColumnKind::List, &other)),
        }
    }

    pub(crate) fn map(&mut self, column: &str) -> StoreResult<JsonMap<String, JsonValue>> {
        match self.take(column) {
            FieldValue::Map(entries) => Ok(entries),
            other => Err(self.mismatch(column, ColumnKind::Map, &other)),
        }
    }

    /// Reads a list column whose elements must all be strings.
    pub(crate) fn string_list(&mut self, column: &str) -> StoreResult<Vec<String>> {
        self.list(column)?
            .into_iter()
            .map(|item| match item {
                JsonValue::String(value) => Ok(value),
                _ => Err(self.shape_error(column, ColumnKind::List, "non-string element")),
            })
            .collect()
    }

    /// Reads a map column whose values must all be booleans.
    pub(crate) fn flag_map(&mut self, column: &str) -> StoreResult<BTreeMap<String, bool>> {
        self.map(column)?
            .into_iter()
            .map(|(key, value)| match value {
                JsonValue::Bool(flag) => Ok((key, flag)),
                _ => Err(self.shape_error(column, ColumnKind::Map, "non-boolean value")),
            })
            .collect()
    }

    /// Reports a stored value that parsed but is not one of the allowed labels.
    pub(crate) fn invalid_label(&self, column: &str, value: &str) -> StoreError {
        self.corrupt(
            column,
            CodecError::UnknownLabel {
                value: value.to_string(),
            },
        )
    }

    fn take(&mut self, column: &str) -> FieldValue {
        self.row.remove(column).unwrap_or(FieldValue::Null)
    }

    fn mismatch(&self, column: &str, declared: ColumnKind, found: &FieldValue) -> StoreError {
        self.corrupt(
            column,
            CodecError::UnexpectedStorage {
                declared,
                found: value_name(found),
            },
        )
    }

    fn shape_error(&self, column: &str, declared: ColumnKind, found: &'static str) -> StoreError {
        self.corrupt(column, CodecError::ShapeMismatch { declared, found })
    }

    fn corrupt(&self, column: &str, source: CodecError) -> StoreError {
        StoreError::Decoding {
            table: self.table.to_string(),
            column: column.to_string(),
            source,
        }
    }
}

fn value_name(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Null => "null",
        FieldValue::Integer(_) => "integer",
        FieldValue::Text(_) => "text",
        FieldValue::Boolean(_) => "boolean",
        FieldValue::List(_) => "list",
        FieldValue::Map(_) => "map",
    }
}
