//! Error surface of the table layer.
//!
//! Write execution failures are absent on purpose: queued writes report them
//! through the log channel only.

use crate::codec::CodecError;
use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// A bootstrap command failed; the table is not ready for use.
    SchemaBootstrap {
        table: String,
        statement: String,
        source: DbError,
    },
    /// A stored value failed to decode on read.
    Decoding {
        table: String,
        column: String,
        source: CodecError,
    },
    /// A value could not be packed for its declared column kind.
    Encoding { column: String, source: CodecError },
    /// A table, index or column name is not a plain SQL identifier.
    InvalidIdentifier(String),
    /// A schema was declared without columns.
    EmptySchema(String),
    /// A read named no fields to select.
    NoFields { table: String },
    /// A mutation was issued before the table's schema bootstrap succeeded.
    NotBootstrapped { table: String },
    /// The table's writer thread is gone and no longer accepts work.
    WriterUnavailable { table: String },
    Db(DbError),
}

impl StoreError {
    /// Returns whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_transient())
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchemaBootstrap {
                table,
                statement,
                source,
            } => write!(
                f,
                "schema bootstrap failed for table `{table}` at `{statement}`: {source}"
            ),
            Self::Decoding {
                table,
                column,
                source,
            } => write!(f, "corrupt value in {table}.{column}: {source}"),
            Self::Encoding { column, source } => {
                write!(f, "cannot encode column `{column}`: {source}")
            }
            Self::InvalidIdentifier(name) => write!(f, "invalid SQL identifier `{name}`"),
            Self::EmptySchema(table) => write!(f, "table `{table}` declares no columns"),
            Self::NoFields { table } => write!(f, "read on table `{table}` selects no fields"),
            Self::NotBootstrapped { table } => {
                write!(f, "table `{table}` accepts no writes before bootstrap")
            }
            Self::WriterUnavailable { table } => {
                write!(f, "writer for table `{table}` is not running")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SchemaBootstrap { source, .. } => Some(source),
            Self::Decoding { source, .. } => Some(source),
            Self::Encoding { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            Self::InvalidIdentifier(_)
            | Self::EmptySchema(_)
            | Self::NoFields { .. }
            | Self::NotBootstrapped { .. }
            | Self::WriterUnavailable { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}
