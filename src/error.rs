//! Top-level error type for migration operations.
//!
//! Only failures that abort a whole operation end up here. Row-level
//! problems are recorded in the run's log instead.

use crate::config::ConfigError;
use crate::dump::ParseError;
use crate::store::StoreError;
use std::fmt;

#[derive(Debug)]
pub enum MigrationError {
    /// The dump could not be read or contains nothing usable.
    Parse(ParseError),
    Config(ConfigError),
    /// The destination could not be queried (status checks).
    Store(StoreError),
    /// Preview of a table the dump does not contain.
    UnknownTable(String),
}

impl MigrationError {
    /// True when the dump file itself is missing or unreadable.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            MigrationError::Parse(ParseError::SourceUnavailable { .. })
        )
    }
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::Parse(e) => write!(f, "{}", e),
            MigrationError::Config(e) => write!(f, "{}", e),
            MigrationError::Store(e) => write!(f, "{}", e),
            MigrationError::UnknownTable(name) => {
                write!(f, "Table '{}' not found in dump", name)
            }
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MigrationError::Parse(e) => Some(e),
            MigrationError::Config(e) => Some(e),
            MigrationError::Store(e) => Some(e),
            MigrationError::UnknownTable(_) => None,
        }
    }
}

impl From<ParseError> for MigrationError {
    fn from(e: ParseError) -> Self {
        MigrationError::Parse(e)
    }
}

impl From<ConfigError> for MigrationError {
    fn from(e: ConfigError) -> Self {
        MigrationError::Config(e)
    }
}

impl From<StoreError> for MigrationError {
    fn from(e: StoreError) -> Self {
        MigrationError::Store(e)
    }
}
