//! Connection bootstrap utilities for table files.
//!
//! # Responsibility
//! - Open writer connections, creating the file when needed.
//! - Open short-lived reader connections without ever creating a file.
//! - Apply journal, sync and busy-timeout pragmas.
//!
//! # Invariants
//! - Writer connections run in the configured journal mode.
//! - Reader connections are opened with `query_only = ON`.

use super::{DbError, DbResult};
use crate::config::StoreConfig;
use log::{debug, error};
use rusqlite::Connection;
use std::time::Instant;

/// Creates the data directory if it does not exist yet.
pub fn ensure_data_dir(config: &StoreConfig) -> DbResult<()> {
    std::fs::create_dir_all(&config.data_dir).map_err(|source| {
        error!(
            "event=data_dir_create module=db status=error path={} error={}",
            config.data_dir.display(),
            source
        );
        DbError::Io {
            path: config.data_dir.clone(),
            source,
        }
    })
}

/// Opens the writer connection for `table`.
///
/// # Side effects
/// - Creates the table file if it does not exist.
/// - Switches the file to the configured journal mode.
pub fn open_writer(config: &StoreConfig, table: &str) -> DbResult<Connection> {
    let started_at = Instant::now();
    let conn = Connection::open(config.db_path(table))
        .and_then(|conn| configure_writer(&conn, config).map(|()| conn))
        .map_err(|err| {
            error!(
                "event=db_open module=db status=error mode=write table={} duration_ms={} error={}",
                table,
                started_at.elapsed().as_millis(),
                err
            );
            DbError::from_sqlite(table, err)
        })?;

    debug!(
        "event=db_open module=db status=ok mode=write table={} duration_ms={}",
        table,
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

/// Opens a short-lived reader connection for `table`.
///
/// Returns [`DbError::TableNotReady`] when the file was never created.
pub fn open_reader(config: &StoreConfig, table: &str) -> DbResult<Connection> {
    let path = config.db_path(table);
    if !path.exists() {
        return Err(DbError::TableNotReady {
            table: table.to_string(),
        });
    }

    let conn = Connection::open(&path)
        .and_then(|conn| configure_reader(&conn, config).map(|()| conn))
        .map_err(|err| {
            error!(
                "event=db_open module=db status=error mode=read table={} error={}",
                table, err
            );
            DbError::from_sqlite(table, err)
        })?;
    Ok(conn)
}

fn configure_writer(conn: &Connection, config: &StoreConfig) -> rusqlite::Result<()> {
    conn.busy_timeout(config.busy_timeout())?;
    // journal_mode reports the resulting mode as a row.
    let _mode: String = conn.query_row(
        &format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()),
        [],
        |row| row.get(0),
    )?;
    conn.execute_batch(&format!(
        "PRAGMA synchronous = {};",
        config.sync_mode.pragma_value()
    ))?;
    Ok(())
}

fn configure_reader(conn: &Connection, config: &StoreConfig) -> rusqlite::Result<()> {
    conn.busy_timeout(config.busy_timeout())?;
    conn.execute_batch("PRAGMA query_only = ON;")?;
    Ok(())
}
