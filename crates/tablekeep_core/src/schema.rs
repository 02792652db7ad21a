//! Declarative table schemas and their bootstrap commands.
//!
//! # Responsibility
//! - Hold one table's name, column fragments and secondary indexes.
//! - Compile to idempotent `CREATE ... IF NOT EXISTS` commands.
//!
//! # Invariants
//! - Table creation is always the first compiled command.
//! - Index commands follow in declaration order.
//! - Column fragments are passed through untouched; only names are checked.

use crate::command::Command;
use crate::error::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Returns `Ok(())` when `name` can be spliced into statement text as-is.
pub fn validate_identifier(name: &str) -> StoreResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Secondary index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    name: String,
    columns: String,
}

impl IndexDef {
    /// `columns` is the parenthesized part of `CREATE INDEX`, e.g. `"cid, expired"`.
    pub fn new(name: impl Into<String>, columns: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self {
            name,
            columns: columns.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Immutable description of one logical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<String>,
    indexes: Vec<IndexDef>,
}

impl TableSchema {
    /// Builds a schema from engine-specific column fragments
    /// (`"cid INTEGER PRIMARY KEY"`).
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        validate_identifier(&name)?;
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(StoreError::EmptySchema(name));
        }
        Ok(Self {
            name,
            columns,
            indexes: Vec::new(),
        })
    }

    /// Adds a secondary index; consumes and returns the schema.
    pub fn with_index(mut self, name: &str, columns: &str) -> StoreResult<Self> {
        self.indexes.push(IndexDef::new(name, columns)?);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Compiles the bootstrap sequence: table first, then every index.
    pub fn compile(&self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(1 + self.indexes.len());
        commands.push(Command::statement_only(format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            self.name,
            self.columns.join(", ")
        )));
        for index in &self.indexes {
            commands.push(Command::statement_only(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({});",
                index.name, self.name, index.columns
            )));
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_identifier, TableSchema};
    use crate::error::StoreError;

    fn timed_limit_schema() -> TableSchema {
        TableSchema::new(
            "timed_limit",
            [
                "uid INTEGER PRIMARY KEY AUTOINCREMENT",
                "cid INTEGER NOT NULL",
                "expired INTEGER NOT NULL",
            ],
        )
        .and_then(|schema| schema.with_index("idx_timed_limit_cid", "cid"))
        .and_then(|schema| schema.with_index("idx_timed_limit_expired", "expired"))
        .unwrap()
    }

    #[test]
    fn compile_emits_table_then_indexes_in_order() {
        let commands = timed_limit_schema().compile();
        let statements: Vec<&str> = commands.iter().map(|c| c.statement()).collect();

        assert_eq!(
            statements,
            vec![
                "CREATE TABLE IF NOT EXISTS timed_limit (uid INTEGER PRIMARY KEY AUTOINCREMENT, cid INTEGER NOT NULL, expired INTEGER NOT NULL);",
                "CREATE INDEX IF NOT EXISTS idx_timed_limit_cid ON timed_limit (cid);",
                "CREATE INDEX IF NOT EXISTS idx_timed_limit_expired ON timed_limit (expired);",
            ]
        );
        assert!(commands.iter().all(|c| c.arguments().is_empty()));
    }

    #[test]
    fn compile_is_repeatable() {
        let schema = timed_limit_schema();
        assert_eq!(schema.compile(), schema.compile());
    }

    #[test]
    fn table_name_must_be_identifier() {
        let err = TableSchema::new("notes; DROP TABLE x", ["id INTEGER"]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    }

    #[test]
    fn schema_without_columns_is_rejected() {
        let err = TableSchema::new("empty_db", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, StoreError::EmptySchema(name) if name == "empty_db"));
    }

    #[test]
    fn identifier_rules() {
        assert!(validate_identifier("steam64_id").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("9lives").is_err());
        assert!(validate_identifier("a-b").is_err());
        assert!(validate_identifier("").is_err());
    }
}
