//! Generic typed CRUD surface over one table.
//!
//! # Responsibility
//! - Turn typed column assignments into queued mutation commands.
//! - Serve point lookups and filtered lists on short-lived reader connections.
//! - Decode every read field through the declared `ColumnKind`.
//!
//! # Invariants
//! - Mutations only reach the file through the table's `WriteSerializer`.
//! - Mutations are rejected until `bootstrap` has succeeded once, so no write
//!   is queued ahead of the schema commands.
//! - Reads never go through the writer and may not see queued writes yet.
//! - `update` with no assignments produces no command.
//! - Missing rows are `None`/empty, never an error.
//! - Decode failures are returned, never replaced with defaults.

use crate::codec::{pack, unpack, ColumnKind, FieldValue};
use crate::command::Command;
use crate::config::StoreConfig;
use crate::db::{open_reader, DbError};
use crate::error::{StoreError, StoreResult};
use crate::schema::{validate_identifier, TableSchema};
use crate::writer::{WriteQueue, WriteSerializer};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row as SqlRow};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One decoded row, keyed by column name.
pub type Row = BTreeMap<String, FieldValue>;

/// Columns to read and the kind each one is declared as.
pub type FieldSet<'a> = &'a [(&'a str, ColumnKind)];

#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    column: String,
    value: FieldValue,
    kind: ColumnKind,
}

/// Ordered column assignments for `insert` and `update`.
///
/// Assigning the same column twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignments {
    entries: Vec<Assignment>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `column`, declared as `kind`.
    pub fn set(
        mut self,
        column: impl Into<String>,
        value: impl Into<FieldValue>,
        kind: ColumnKind,
    ) -> Self {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.column == column) {
            Some(entry) => {
                entry.value = value;
                entry.kind = kind;
            }
            None => self.entries.push(Assignment {
                column,
                value,
                kind,
            }),
        }
        self
    }

    /// Assigns only when `value` is present; the partial-update building block.
    pub fn set_if_some<T: Into<FieldValue>>(
        self,
        column: impl Into<String>,
        value: Option<T>,
        kind: ColumnKind,
    ) -> Self {
        match value {
            Some(value) => self.set(column, value, kind),
            None => self,
        }
    }

    pub fn integer(self, column: impl Into<String>, value: i64) -> Self {
        self.set(column, value, ColumnKind::Integer)
    }

    pub fn text(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value.into(), ColumnKind::Text)
    }

    pub fn boolean(self, column: impl Into<String>, value: bool) -> Self {
        self.set(column, value, ColumnKind::Boolean)
    }

    pub fn list(self, column: impl Into<String>, items: Vec<JsonValue>) -> Self {
        self.set(column, items, ColumnKind::List)
    }

    pub fn map(self, column: impl Into<String>, entries: JsonMap<String, JsonValue>) -> Self {
        self.set(column, entries, ColumnKind::Map)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Validates column names and packs values in assignment order.
    fn pack(&self) -> StoreResult<(Vec<&str>, Vec<Value>)> {
        let mut columns = Vec::with_capacity(self.entries.len());
        let mut values = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            validate_identifier(&entry.column)?;
            let packed = pack(&entry.value, entry.kind).map_err(|source| StoreError::Encoding {
                column: entry.column.clone(),
                source,
            })?;
            columns.push(entry.column.as_str());
            values.push(packed);
        }
        Ok((columns, values))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filter, ordering and pagination for `list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Optional `column = value` equality filter.
    pub filter: Option<(String, Value)>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

impl ListQuery {
    /// Every row, in storage order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// CRUD facade bound to one table schema and its writer.
pub struct TableController {
    schema: TableSchema,
    config: StoreConfig,
    writer: Arc<dyn WriteSerializer>,
    bootstrapped: AtomicBool,
}

impl TableController {
    /// Starts a dedicated [`WriteQueue`] for `schema` and binds it.
    ///
    /// The table is not usable until [`TableController::bootstrap`] succeeds.
    pub fn open(config: &StoreConfig, schema: TableSchema) -> StoreResult<Self> {
        let writer = WriteQueue::start(config, schema.name())?;
        Ok(Self::with_writer(config, schema, Arc::new(writer)))
    }

    /// Binds `schema` to an existing writer.
    pub fn with_writer(
        config: &StoreConfig,
        schema: TableSchema,
        writer: Arc<dyn WriteSerializer>,
    ) -> Self {
        debug_assert_eq!(writer.table(), schema.name());
        Self {
            schema,
            config: config.clone(),
            writer,
            bootstrapped: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Creates the table and its indexes if missing; waits for the outcome.
    ///
    /// Safe to call on every process start. Writes are accepted only after
    /// the first successful call.
    pub fn bootstrap(&self) -> StoreResult<()> {
        self.writer.bootstrap(self.schema.compile())?;
        self.bootstrapped.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::Acquire)
    }

    /// Queues a one-row insert. An empty assignment set inserts `DEFAULT VALUES`.
    ///
    /// Constraint violations are only visible in the writer's failure log.
    pub fn insert(&self, columns: &Assignments) -> StoreResult<()> {
        self.ensure_bootstrapped()?;
        let (names, values) = columns.pack()?;
        let statement = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.name())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.name(),
                names.join(", "),
                vec!["?"; names.len()].join(", ")
            )
        };
        self.writer.submit(Command::new(statement, values))
    }

    /// Queues `SET columns WHERE key_column = key`. No-op for empty `columns`.
    pub fn update(
        &self,
        key_column: &str,
        key: impl Into<Value>,
        columns: &Assignments,
    ) -> StoreResult<()> {
        self.ensure_bootstrapped()?;
        if columns.is_empty() {
            return Ok(());
        }
        validate_identifier(key_column)?;

        let (names, mut values) = columns.pack()?;
        let set_clause = names
            .iter()
            .map(|name| format!("{name} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        values.push(key.into());

        self.writer.submit(Command::new(
            format!(
                "UPDATE {} SET {} WHERE {} = ?",
                self.name(),
                set_clause,
                key_column
            ),
            values,
        ))
    }

    /// Queues removal of every row where `key_column = key`.
    pub fn delete(&self, key_column: &str, key: impl Into<Value>) -> StoreResult<()> {
        self.ensure_bootstrapped()?;
        validate_identifier(key_column)?;
        self.writer.submit(Command::new(
            format!("DELETE FROM {} WHERE {} = ?", self.name(), key_column),
            vec![key.into()],
        ))
    }

    /// Reads the first row where `key_column = key`.
    pub fn get(
        &self,
        key_column: &str,
        key: impl Into<Value>,
        fields: FieldSet<'_>,
    ) -> StoreResult<Option<Row>> {
        validate_identifier(key_column)?;
        let select = self.select_clause(fields)?;
        let sql = format!("{select} WHERE {key_column} = ? LIMIT 1");

        let mut rows = self.query(&sql, vec![key.into()], fields)?;
        debug!(
            "event=db_read module=table status=ok op=get table={} found={}",
            self.name(),
            !rows.is_empty()
        );
        Ok(rows.pop())
    }

    /// Reads every row matching `query`, in the requested order.
    pub fn list(&self, fields: FieldSet<'_>, query: &ListQuery) -> StoreResult<Vec<Row>> {
        let mut sql = self.select_clause(fields)?;
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some((column, value)) = &query.filter {
            validate_identifier(column)?;
            sql.push_str(&format!(" WHERE {column} = ?"));
            bind_values.push(value.clone());
        }

        if let Some((column, direction)) = &query.order_by {
            validate_identifier(column)?;
            sql.push_str(&format!(" ORDER BY {column} {}", direction.as_sql()));
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let rows = self.query(&sql, bind_values, fields)?;
        debug!(
            "event=db_read module=table status=ok op=list table={} rows={}",
            self.name(),
            rows.len()
        );
        Ok(rows)
    }

    /// Blocks until every write queued so far has been processed.
    pub fn flush(&self) -> StoreResult<()> {
        self.writer.flush()
    }

    fn ensure_bootstrapped(&self) -> StoreResult<()> {
        if self.is_bootstrapped() {
            Ok(())
        } else {
            Err(StoreError::NotBootstrapped {
                table: self.name().to_string(),
            })
        }
    }

    fn select_clause(&self, fields: FieldSet<'_>) -> StoreResult<String> {
        if fields.is_empty() {
            return Err(StoreError::NoFields {
                table: self.name().to_string(),
            });
        }
        for (name, _) in fields {
            validate_identifier(name)?;
        }
        let columns = fields
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("SELECT {columns} FROM {}", self.name()))
    }

    fn query(
        &self,
        sql: &str,
        bind_values: Vec<Value>,
        fields: FieldSet<'_>,
    ) -> StoreResult<Vec<Row>> {
        let table = self.name();
        let run = || -> Result<Vec<Row>, StoreError> {
            let conn = open_reader(&self.config, table)?;
            let mut stmt = conn
                .prepare(sql)
                .map_err(|err| DbError::from_sqlite(table, err))?;
            let mut rows = stmt
                .query(params_from_iter(bind_values))
                .map_err(|err| DbError::from_sqlite(table, err))?;

            let mut decoded = Vec::new();
            while let Some(row) = rows.next().map_err(|err| DbError::from_sqlite(table, err))? {
                decoded.push(decode_row(table, row, fields)?);
            }
            Ok(decoded)
        };

        run().inspect_err(|err| {
            warn!(
                "event=db_read module=table status=error table={} transient={} error={}",
                table,
                err.is_transient(),
                err
            );
        })
    }
}

fn decode_row(table: &str, row: &SqlRow<'_>, fields: FieldSet<'_>) -> StoreResult<Row> {
    let mut decoded = Row::new();
    for (index, (name, kind)) in fields.iter().enumerate() {
        let raw: Value = row
            .get(index)
            .map_err(|err| DbError::from_sqlite(table, err))?;
        let value = unpack(raw, *kind).map_err(|source| StoreError::Decoding {
            table: table.to_string(),
            column: (*name).to_string(),
            source,
        })?;
        decoded.insert((*name).to_string(), value);
    }
    Ok(decoded)
}
