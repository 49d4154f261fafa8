//! Legacy dump parsing.
//!
//! Reads a MySQL-dialect dump and rebuilds an in-memory table model: table
//! name -> ordered raw rows. Cells are kept as text; type coercion belongs to
//! the field mapper.

pub mod parser;
pub mod statement;
pub mod values;

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

pub use parser::DumpParser;
pub use statement::{Statement, StatementSplitter};

/// One cell of a raw row. `None` is the bareword `NULL`.
pub type Cell = Option<String>;

/// One raw row in dump order.
pub type RawRow = Vec<Cell>;

/// A table reconstructed from the dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedTable {
    pub name: String,
    /// Column names from `CREATE TABLE` or the `INSERT` column list, if any.
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ParsedTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A statement that was recognized but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Result of parsing a whole dump.
#[derive(Debug, Clone, Default)]
pub struct ParsedDump {
    tables: IndexMap<String, ParsedTable>,
    warnings: Vec<ParseWarning>,
    statements: usize,
}

impl ParsedDump {
    /// Look up a table by name; the lookup is normalized the same way
    /// identifiers in the dump are.
    pub fn table(&self, name: &str) -> Option<&ParsedTable> {
        self.tables.get(&parser::normalize_identifier(name))
    }

    /// Table names in the order they first appeared.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &ParsedTable> {
        self.tables.values()
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// Total statements seen, recognized or not.
    pub fn statement_count(&self) -> usize {
        self.statements
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(ParsedTable::row_count).sum()
    }

    pub(crate) fn table_entry(&mut self, name: String) -> &mut ParsedTable {
        self.tables
            .entry(name.clone())
            .or_insert_with(|| ParsedTable::new(name))
    }

    pub(crate) fn warn(&mut self, line: usize, message: String) {
        self.warnings.push(ParseWarning { line, message });
    }
}

/// Errors that abort parsing of the whole dump.
#[derive(Debug)]
pub enum ParseError {
    /// The dump file is missing or unreadable.
    SourceUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Nothing in the input looks like a table definition or an insert.
    NoStatements,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::SourceUnavailable { path, source } => {
                write!(f, "Dump file {} is unavailable: {}", path.display(), source)
            }
            ParseError::NoStatements => {
                write!(f, "Dump contains no CREATE TABLE or INSERT statements")
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::SourceUnavailable { source, .. } => Some(source),
            ParseError::NoStatements => None,
        }
    }
}
