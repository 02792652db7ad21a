//! SQLite connection plumbing for per-table database files.
//!
//! # Responsibility
//! - Open writer and reader connections for one table file.
//! - Classify raw SQLite failures into the conditions callers act on.
//!
//! # Invariants
//! - Every connection carries the configured busy timeout.
//! - Reader connections are `query_only` and never create the file.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod open;

pub use open::{ensure_data_dir, open_reader, open_writer};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The busy timeout elapsed while waiting for a file lock.
    LockWaitTimeout {
        table: String,
        source: rusqlite::Error,
    },
    /// The table file or table does not exist yet; bootstrap has not completed.
    TableNotReady { table: String },
}

impl DbError {
    /// Maps a SQLite failure observed against `table`.
    pub fn from_sqlite(table: &str, err: rusqlite::Error) -> Self {
        // Prepare-time failures carry a statement offset and arrive as `SqlInputError`.
        let (code, message) = match &err {
            rusqlite::Error::SqliteFailure(ffi_err, message) => (ffi_err.code, message.as_deref()),
            rusqlite::Error::SqlInputError { error, msg, .. } => (error.code, Some(msg.as_str())),
            _ => return Self::Sqlite(err),
        };

        if matches!(code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) {
            return Self::LockWaitTimeout {
                table: table.to_string(),
                source: err,
            };
        }
        if message.is_some_and(|text| text.starts_with("no such table")) {
            return Self::TableNotReady {
                table: table.to_string(),
            };
        }
        Self::Sqlite(err)
    }

    /// Returns whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LockWaitTimeout { .. } | Self::TableNotReady { .. }
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "io error at `{}`: {source}", path.display()),
            Self::LockWaitTimeout { table, source } => {
                write!(f, "lock wait timed out on table `{table}`: {source}")
            }
            Self::TableNotReady { table } => {
                write!(f, "table `{table}` is not bootstrapped yet")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::LockWaitTimeout { source, .. } => Some(source),
            Self::TableNotReady { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;
    use rusqlite::Connection;

    #[test]
    fn missing_table_is_classified_as_not_ready() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .prepare("SELECT cid FROM access_db")
            .map(|_| ())
            .unwrap_err();

        let classified = DbError::from_sqlite("access_db", err);
        assert!(matches!(classified, DbError::TableNotReady { ref table } if table == "access_db"));
        assert!(classified.is_transient());
    }

    #[test]
    fn constraint_failure_stays_a_sqlite_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        let err = conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap_err();

        let classified = DbError::from_sqlite("t", err);
        assert!(matches!(classified, DbError::Sqlite(_)));
        assert!(!classified.is_transient());
    }
}
