//! Immutable statement-plus-arguments unit of work.
//!
//! # Invariants
//! - A `Command` never changes after construction.
//! - Clones share the statement and argument buffers.

use rusqlite::types::Value;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// One parameterized statement and its bound arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    statement: Arc<str>,
    arguments: Arc<[Value]>,
}

impl Command {
    pub fn new(statement: impl Into<Arc<str>>, arguments: Vec<Value>) -> Self {
        Self {
            statement: statement.into(),
            arguments: arguments.into(),
        }
    }

    /// Creates a command without bound arguments.
    pub fn statement_only(statement: impl Into<Arc<str>>) -> Self {
        Self::new(statement, Vec::new())
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.statement, self.arguments)
    }
}
