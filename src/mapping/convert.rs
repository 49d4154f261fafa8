//! Per-field conversions from raw dump text to typed target values.

use super::category::CategoryTable;
use super::record::FieldValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    /// Pass text through; `NULL` stays absent.
    #[default]
    Text,
    /// Pass text through; `NULL` is a mapping error.
    RequiredText,
    /// Signed 64-bit integer.
    Integer,
    /// `1`/`0`, `true`/`false`, `yes`/`no`.
    Boolean,
    /// Unix epoch seconds; empty or `0` means never.
    EpochSeconds,
    /// MySQL `DATETIME`/`DATE` text in UTC; zero dates mean absent.
    Datetime,
    /// Free-text category translated through the category table.
    Category,
}

/// Outcome of a failed conversion, before the column is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    Required,
    Invalid(String),
}

impl Conversion {
    pub fn apply(
        self,
        cell: Option<&str>,
        categories: &CategoryTable,
    ) -> Result<FieldValue, ConversionError> {
        match self {
            Conversion::Text => Ok(FieldValue::Text(cell.map(str::to_string))),
            Conversion::RequiredText => match cell {
                Some(s) => Ok(FieldValue::Text(Some(s.to_string()))),
                None => Err(ConversionError::Required),
            },
            Conversion::Integer => match non_empty(cell) {
                None => Ok(FieldValue::Integer(None)),
                Some(s) => s
                    .parse::<i64>()
                    .map(|i| FieldValue::Integer(Some(i)))
                    .map_err(|e| ConversionError::Invalid(e.to_string())),
            },
            Conversion::Boolean => match non_empty(cell).map(str::to_ascii_lowercase).as_deref() {
                None => Ok(FieldValue::Bool(None)),
                Some("1" | "true" | "yes" | "y") => Ok(FieldValue::Bool(Some(true))),
                Some("0" | "false" | "no" | "n") => Ok(FieldValue::Bool(Some(false))),
                Some(_) => Err(ConversionError::Invalid("not a boolean".to_string())),
            },
            Conversion::EpochSeconds => match non_empty(cell) {
                None | Some("0") => Ok(FieldValue::Timestamp(None)),
                Some(s) => {
                    let secs = s
                        .parse::<i64>()
                        .map_err(|e| ConversionError::Invalid(e.to_string()))?;
                    DateTime::from_timestamp(secs, 0)
                        .map(|t| FieldValue::Timestamp(Some(t)))
                        .ok_or_else(|| ConversionError::Invalid("epoch out of range".to_string()))
                }
            },
            Conversion::Datetime => match non_empty(cell) {
                None => Ok(FieldValue::Timestamp(None)),
                Some(s) if s.starts_with("0000-00-00") => Ok(FieldValue::Timestamp(None)),
                Some(s) => parse_mysql_datetime(s)
                    .map(|t| FieldValue::Timestamp(Some(t)))
                    .ok_or_else(|| ConversionError::Invalid("not a datetime".to_string())),
            },
            Conversion::Category => Ok(FieldValue::Text(Some(
                categories.resolve(cell).to_string(),
            ))),
        }
    }
}

fn non_empty(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_mysql_datetime(s: &str) -> Option<DateTime<Utc>> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
