//! Single-writer queue for one table file.
//!
//! # Responsibility
//! - Accept mutation commands from any thread without blocking on execution.
//! - Execute them one at a time, in submission order, on a dedicated thread.
//! - Report bootstrap outcomes synchronously and write failures via the log.
//!
//! # Invariants
//! - Exactly one worker thread per `WriteQueue`; it is the only writer of the
//!   table file.
//! - Every command runs in its own IMMEDIATE transaction on a fresh connection.
//! - A failed command is rolled back, logged and counted; later commands still run.
//!
//! # See also
//! - `table::TableController` for the typed surface built on this queue.

use crate::command::Command;
use crate::config::StoreConfig;
use crate::db::{ensure_data_dir, open_writer, DbError, DbResult};
use crate::error::{StoreError, StoreResult};
use crate::logging::{flatten_message, sanitize_message};
use log::{debug, error, info, warn};
use rusqlite::{params_from_iter, TransactionBehavior};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

const MAX_LOGGED_ERROR_CHARS: usize = 240;

/// Destination for a table's mutations.
///
/// `TableController` only talks to this trait, so tests can substitute a
/// recording implementation for the threaded queue.
pub trait WriteSerializer: Send + Sync {
    /// Name of the table this serializer writes.
    fn table(&self) -> &str;

    /// Enqueues one mutation and returns without waiting for it to run.
    fn submit(&self, command: Command) -> StoreResult<()>;

    /// Runs schema commands in order and waits for the outcome.
    fn bootstrap(&self, commands: Vec<Command>) -> StoreResult<()>;

    /// Waits until every command submitted before this call was processed.
    fn flush(&self) -> StoreResult<()>;
}

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Blocked waiting for the next job.
    Idle,
    /// Running exactly one job.
    Executing,
    /// Queue closed and drained.
    Stopped,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Executing,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Executing => 1,
            Self::Stopped => 2,
        }
    }
}

/// Point-in-time counters for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    pub submitted: u64,
    pub executed: u64,
    pub failed: u64,
    pub state: WorkerState,
}

impl WriterStats {
    /// Mutations accepted but not yet processed.
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.executed)
            .saturating_sub(self.failed)
    }
}

#[derive(Default)]
struct SharedStats {
    submitted: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    state: AtomicU8,
}

impl SharedStats {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn snapshot(&self) -> WriterStats {
        WriterStats {
            submitted: self.submitted.load(Ordering::Acquire),
            executed: self.executed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            state: WorkerState::from_u8(self.state.load(Ordering::Acquire)),
        }
    }
}

struct BootstrapFailure {
    statement: String,
    error: DbError,
}

enum WriteJob {
    Execute(Command),
    Bootstrap {
        commands: Vec<Command>,
        response: Sender<Result<(), BootstrapFailure>>,
    },
    Barrier {
        response: Sender<()>,
    },
}

impl WriteJob {
    /// Barriers only signal; they never touch the table file.
    fn runs_statements(&self) -> bool {
        matches!(self, Self::Execute(_) | Self::Bootstrap { .. })
    }
}

/// Threaded [`WriteSerializer`] owning one table's worker.
///
/// Dropping the queue closes it, lets the worker drain what is already
/// queued, and joins the thread.
pub struct WriteQueue {
    table: String,
    sender: Option<Sender<WriteJob>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<SharedStats>,
}

impl WriteQueue {
    /// Starts the worker thread for `table`.
    ///
    /// # Side effects
    /// - Creates the data directory.
    /// - Spawns a thread named `tablekeep-writer-<table>`.
    pub fn start(config: &StoreConfig, table: &str) -> StoreResult<Self> {
        ensure_data_dir(config)?;

        let (sender, receiver) = mpsc::channel();
        let stats = Arc::new(SharedStats::default());
        let worker = Worker {
            table: table.to_string(),
            config: config.clone(),
            stats: Arc::clone(&stats),
        };
        let handle = thread::Builder::new()
            .name(format!("tablekeep-writer-{table}"))
            .spawn(move || worker.run(receiver))
            .map_err(|source| {
                StoreError::Db(DbError::Io {
                    path: config.db_path(table),
                    source,
                })
            })?;

        Ok(Self {
            table: table.to_string(),
            sender: Some(sender),
            worker: Some(handle),
            stats,
        })
    }

    pub fn stats(&self) -> WriterStats {
        self.stats.snapshot()
    }

    /// Closes the queue, waits for the worker to drain it, and joins.
    pub fn shutdown(mut self) -> StoreResult<()> {
        if self.stop_worker() {
            Ok(())
        } else {
            Err(StoreError::WriterUnavailable {
                table: self.table.clone(),
            })
        }
    }

    /// Returns `false` when the worker thread panicked.
    fn stop_worker(&mut self) -> bool {
        self.sender.take();
        match self.worker.take() {
            Some(handle) => handle.join().is_ok(),
            None => true,
        }
    }

    fn send(&self, job: WriteJob) -> StoreResult<()> {
        let unavailable = || StoreError::WriterUnavailable {
            table: self.table.clone(),
        };
        let sender = self.sender.as_ref().ok_or_else(unavailable)?;
        sender.send(job).map_err(|_| unavailable())
    }
}

impl WriteSerializer for WriteQueue {
    fn table(&self) -> &str {
        &self.table
    }

    fn submit(&self, command: Command) -> StoreResult<()> {
        // Counted before sending so `pending()` never observes executed > submitted.
        self.stats.submitted.fetch_add(1, Ordering::AcqRel);
        self.send(WriteJob::Execute(command)).inspect_err(|_| {
            self.stats.submitted.fetch_sub(1, Ordering::AcqRel);
        })
    }

    fn bootstrap(&self, commands: Vec<Command>) -> StoreResult<()> {
        let (response, outcome) = mpsc::channel();
        self.send(WriteJob::Bootstrap { commands, response })?;
        match outcome.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(failure)) => Err(StoreError::SchemaBootstrap {
                table: self.table.clone(),
                statement: failure.statement,
                source: failure.error,
            }),
            Err(_) => Err(StoreError::WriterUnavailable {
                table: self.table.clone(),
            }),
        }
    }

    fn flush(&self) -> StoreResult<()> {
        let (response, done) = mpsc::channel();
        self.send(WriteJob::Barrier { response })?;
        done.recv().map_err(|_| StoreError::WriterUnavailable {
            table: self.table.clone(),
        })
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        if !self.stop_worker() {
            error!(
                "event=writer_stop module=writer status=error table={} error_code=worker_panicked",
                self.table
            );
        }
    }
}

struct Worker {
    table: String,
    config: StoreConfig,
    stats: Arc<SharedStats>,
}

impl Worker {
    fn run(self, receiver: Receiver<WriteJob>) {
        info!(
            "event=writer_start module=writer status=ok table={}",
            self.table
        );

        while let Ok(job) = receiver.recv() {
            if job.runs_statements() {
                self.stats.set_state(WorkerState::Executing);
            }
            match job {
                WriteJob::Execute(command) => self.execute_logged(&command),
                WriteJob::Bootstrap { commands, response } => {
                    // The caller may have stopped waiting; the outcome is logged either way.
                    let _ = response.send(self.bootstrap(&commands));
                }
                WriteJob::Barrier { response } => {
                    let _ = response.send(());
                }
            }
            self.stats.set_state(WorkerState::Idle);
        }

        self.stats.set_state(WorkerState::Stopped);
        info!(
            "event=writer_stop module=writer status=ok table={} executed={} failed={}",
            self.table,
            self.stats.executed.load(Ordering::Acquire),
            self.stats.failed.load(Ordering::Acquire)
        );
    }

    fn execute_logged(&self, command: &Command) {
        let started_at = Instant::now();
        match self.execute(command) {
            Ok(()) => {
                self.stats.executed.fetch_add(1, Ordering::AcqRel);
                debug!(
                    "event=db_write module=writer status=ok table={} duration_ms={}",
                    self.table,
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::AcqRel);
                error!(
                    "event=db_write module=writer status=error table={} duration_ms={} statement={} arguments={} error={}",
                    self.table,
                    started_at.elapsed().as_millis(),
                    flatten_message(command.statement()),
                    logged_arguments(command),
                    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
            }
        }
    }

    fn bootstrap(&self, commands: &[Command]) -> Result<(), BootstrapFailure> {
        let started_at = Instant::now();
        for command in commands {
            if let Err(err) = self.execute(command) {
                error!(
                    "event=table_bootstrap module=writer status=error table={} statement={} error={}",
                    self.table,
                    flatten_message(command.statement()),
                    err
                );
                return Err(BootstrapFailure {
                    statement: command.statement().to_string(),
                    error: err,
                });
            }
        }

        info!(
            "event=table_bootstrap module=writer status=ok table={} commands={} duration_ms={}",
            self.table,
            commands.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn execute(&self, command: &Command) -> DbResult<()> {
        let mut conn = open_writer(&self.config, &self.table)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| DbError::from_sqlite(&self.table, err))?;

        match tx.execute(command.statement(), params_from_iter(command.arguments())) {
            Ok(_) => tx
                .commit()
                .map_err(|err| DbError::from_sqlite(&self.table, err)),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=db_rollback module=writer status=error table={} error={}",
                        self.table, rollback_err
                    );
                }
                Err(DbError::from_sqlite(&self.table, err))
            }
        }
    }
}

/// Full argument list on one line; a dropped write must be reproducible from it.
fn logged_arguments(command: &Command) -> String {
    flatten_message(&format!("{:?}", command.arguments()))
}

#[cfg(test)]
mod tests {
    use super::{logged_arguments, WorkerState, WriteJob, WriteQueue, WriteSerializer, WriterStats};
    use crate::command::Command;
    use crate::config::StoreConfig;
    use crate::error::StoreError;
    use rusqlite::types::Value;
    use rusqlite::Connection;

    fn queue_with_table(config: &StoreConfig) -> WriteQueue {
        let queue = WriteQueue::start(config, "events").unwrap();
        queue
            .bootstrap(vec![Command::statement_only(
                "CREATE TABLE IF NOT EXISTS events (id INTEGER PRIMARY KEY, label TEXT NOT NULL);",
            )])
            .unwrap();
        queue
    }

    fn insert(id: i64, label: &str) -> Command {
        Command::new(
            "INSERT INTO events (id, label) VALUES (?, ?)",
            vec![Value::Integer(id), Value::Text(label.to_string())],
        )
    }

    #[test]
    fn failed_command_does_not_stop_later_writes() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_data_dir(dir.path());
        let queue = queue_with_table(&config);

        queue.submit(insert(1, "first")).unwrap();
        queue.submit(insert(1, "duplicate key")).unwrap();
        queue
            .submit(Command::statement_only("INSERT INTO missing_table VALUES (1)"))
            .unwrap();
        queue.submit(insert(2, "second")).unwrap();
        queue.flush().unwrap();

        let stats = queue.stats();
        assert_eq!(stats.submitted, 4);
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.pending(), 0);
        assert_eq!(stats.state, WorkerState::Idle);

        let conn = Connection::open(config.db_path("events")).unwrap();
        let labels: Vec<String> = conn
            .prepare("SELECT label FROM events ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(labels, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn bootstrap_failure_is_returned_with_statement() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_data_dir(dir.path());
        let queue = WriteQueue::start(&config, "broken").unwrap();

        let err = queue
            .bootstrap(vec![
                Command::statement_only("CREATE TABLE IF NOT EXISTS broken (id INTEGER);"),
                Command::statement_only("CREATE INDEX IF NOT EXISTS idx_broken ON broken (nope);"),
            ])
            .unwrap_err();

        match err {
            StoreError::SchemaBootstrap {
                table, statement, ..
            } => {
                assert_eq!(table, "broken");
                assert!(statement.contains("idx_broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shutdown_drains_queued_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_data_dir(dir.path());
        let queue = queue_with_table(&config);

        for id in 0..25 {
            queue.submit(insert(id, "row")).unwrap();
        }
        queue.shutdown().unwrap();

        let conn = Connection::open(config.db_path("events")).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 25);
    }

    #[test]
    fn pending_never_underflows() {
        let stats = WriterStats {
            submitted: 1,
            executed: 1,
            failed: 1,
            state: WorkerState::Idle,
        };
        assert_eq!(stats.pending(), 0);
    }

    #[test]
    fn failure_log_keeps_large_arguments_whole() {
        let payload = format!("{{\"notes\":\"{}\nend\"}}", "x".repeat(4_000));
        let command = Command::new(
            "INSERT INTO events (id, label) VALUES (?, ?)",
            vec![Value::Integer(1), Value::Text(payload)],
        );

        let logged = logged_arguments(&command);
        assert!(logged.contains(&"x".repeat(4_000)));
        assert!(logged.contains("end"));
        assert!(!logged.contains('\n'));
    }

    #[test]
    fn only_statement_jobs_mark_the_worker_executing() {
        let (response, _done) = std::sync::mpsc::channel();
        assert!(!WriteJob::Barrier { response }.runs_statements());
        assert!(WriteJob::Execute(insert(1, "row")).runs_statements());

        let (response, _outcome) = std::sync::mpsc::channel();
        assert!(WriteJob::Bootstrap {
            commands: Vec::new(),
            response,
        }
        .runs_statements());
    }
}
