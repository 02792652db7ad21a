//! Operator entry point for the tablekeep store.
//!
//! # Responsibility
//! - Bootstrap every entity table under a data directory before services start.
//! - Report the core crate version.
//!
//! # Invariants
//! - Exit code is `0` only when every requested step succeeded.
//! - Output is one line per table, stable for scripting.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tablekeep_core::{bootstrap_all, core_version, default_log_level, init_logging, StoreConfig};

#[derive(Debug, Parser)]
#[command(name = "tablekeep_cli", about = "Table-per-file SQLite store tooling", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding one database file per table.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON store config; `--data-dir` overrides its `data_dir`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enables file logging under this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Create every entity table and its indexes (default).
    Bootstrap,
    /// Print the core crate version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Bootstrap) {
        Command::Version => {
            println!("tablekeep_core version={}", core_version());
            ExitCode::SUCCESS
        }
        Command::Bootstrap => match run_bootstrap(&cli) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                eprintln!("bootstrap failed: {message}");
                ExitCode::from(1)
            }
        },
    }
}

fn run_bootstrap(cli: &Cli) -> Result<(), String> {
    if let Some(log_dir) = &cli.log_dir {
        init_logging(default_log_level(), absolute(log_dir)?)?;
    }

    let config = store_config(cli)?;
    let tables = bootstrap_all(&config).map_err(|err| err.to_string())?;
    for name in tables.table_names() {
        println!("{name} ready at {}", config.db_path(name).display());
    }
    Ok(())
}

fn store_config(cli: &Cli) -> Result<StoreConfig, String> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_json_file(path).map_err(|err| err.to_string())?,
        None => StoreConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

fn absolute(path: &Path) -> Result<PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|err| format!("cannot resolve `{}`: {err}", path.display()))
}
