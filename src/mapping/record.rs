//! Mapped records and the errors produced while building them.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// A typed target value. Each variant carries its own absence so the store
/// can bind a correctly typed `NULL`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Bool(Option<bool>),
    Timestamp(Option<DateTime<Utc>>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Integer(v) => v.is_none(),
            FieldValue::Bool(v) => v.is_none(),
            FieldValue::Timestamp(v) => v.is_none(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(Some(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(Some(s)) => write!(f, "{}", s),
            FieldValue::Integer(Some(i)) => write!(f, "{}", i),
            FieldValue::Bool(Some(b)) => write!(f, "{}", b),
            FieldValue::Timestamp(Some(t)) => {
                write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            _ => write!(f, "NULL"),
        }
    }
}

/// A row shaped for a target table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedRecord {
    pub table: String,
    pub fields: IndexMap<String, FieldValue>,
}

impl MappedRecord {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn set(&mut self, column: impl Into<String>, value: FieldValue) {
        self.fields.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.values()
    }

    /// `col=value` pairs for the given key columns, used in log messages.
    pub fn describe_key(&self, key: &[String]) -> String {
        key.iter()
            .map(|col| match self.get(col) {
                Some(value) => format!("{}={}", col, value),
                None => format!("{}=?", col),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Why a raw row could not be turned into a record.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    /// The row has fewer positional fields than the mapping references.
    MissingField {
        column: String,
        position: usize,
        row_len: usize,
    },
    /// A required value is `NULL` in the dump.
    RequiredFieldMissing { column: String },
    /// The cell could not be converted to the target type.
    InvalidValue {
        column: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::MissingField {
                column,
                position,
                row_len,
            } => write!(
                f,
                "Field '{}' expects position {} but the row has only {} values",
                column, position, row_len
            ),
            MappingError::RequiredFieldMissing { column } => {
                write!(f, "Required field '{}' is NULL", column)
            }
            MappingError::InvalidValue {
                column,
                value,
                reason,
            } => write!(f, "Invalid value '{}' for '{}': {}", value, column, reason),
        }
    }
}

impl std::error::Error for MappingError {}
