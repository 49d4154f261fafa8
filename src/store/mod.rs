//! Destination store abstraction.
//!
//! The loader only needs three things from the new database: insert one
//! record idempotently, list tables by prefix, and count rows.

pub mod database;
pub mod memory;
pub mod postgres;

use crate::mapping::MappedRecord;
use std::fmt;

pub use database::{Database, DatabaseConfig, Pool, PooledConnection};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of one insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same logical key already exists; nothing was written.
    Duplicate,
}

pub trait DestinationStore {
    /// Insert one record. Conflicts on `unique_key` are a `Duplicate`, not an
    /// error.
    fn insert(
        &mut self,
        record: &MappedRecord,
        unique_key: &[String],
    ) -> Result<InsertOutcome, StoreError>;

    /// Names of tables starting with `prefix`, sorted.
    fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>, StoreError>;

    fn count_rows(&mut self, table: &str) -> Result<i64, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    Pool(String),
    Query(diesel::result::Error),
    InvalidIdentifier(String),
    UnknownTable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Pool(msg) => write!(f, "Database pool error: {}", msg),
            StoreError::Query(e) => write!(f, "Database error: {}", e),
            StoreError::InvalidIdentifier(name) => write!(f, "Invalid SQL identifier: {}", name),
            StoreError::UnknownTable(name) => write!(f, "Unknown table: {}", name),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Query(e) => Some(e),
            _ => None,
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        StoreError::Query(e)
    }
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        StoreError::Pool(e.to_string())
    }
}

/// Plain SQL identifier: ASCII letter or `_`, then letters, digits or `_`,
/// at most 63 bytes (the Postgres limit).
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote a validated identifier for interpolation into SQL.
pub fn quote_identifier(name: &str) -> Result<String, StoreError> {
    if is_valid_identifier(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
