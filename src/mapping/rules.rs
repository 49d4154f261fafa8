//! Declarative legacy -> target table correspondences.
//!
//! A [`MappingSet`] is versioned and can be loaded from YAML so new legacy
//! tables can be added without touching code:
//!
//! ```yaml
//! version: 1
//! categories:
//!   members: [webinar, news, resource, event]
//!   fallback: news
//!   aliases:
//!     Press Release: news
//! tables:
//!   - legacy_table: admin
//!     target_table: cms_admin_accounts
//!     unique_key: [username]
//!     fields:
//!       - { column: legacy_id, source: 0, convert: integer }
//!       - { column: username, source: 1, convert: required_text }
//! ```

use super::category::CategoryTable;
use super::convert::{Conversion, ConversionError};
use super::record::{MappedRecord, MappingError};
use crate::config::ConfigError;
use crate::dump::{parser::normalize_identifier, Cell};
use crate::store::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// The mapping format version this build understands.
pub const MAPPING_VERSION: u32 = 1;

/// One target column fed from one positional legacy field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub column: String,
    /// Zero-based position in the legacy row.
    pub source: usize,
    #[serde(default)]
    pub convert: Conversion,
}

impl FieldSpec {
    pub fn new(column: &str, source: usize, convert: Conversion) -> Self {
        Self {
            column: column.to_string(),
            source,
            convert,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    pub legacy_table: String,
    pub target_table: String,
    /// Columns that identify a row logically; duplicates are skipped.
    #[serde(default)]
    pub unique_key: Vec<String>,
    pub fields: Vec<FieldSpec>,
}

impl TableMapping {
    /// Smallest row length that satisfies every field.
    pub fn required_width(&self) -> usize {
        self.fields.iter().map(|f| f.source + 1).max().unwrap_or(0)
    }

    pub fn map_row(
        &self,
        row: &[Cell],
        categories: &CategoryTable,
    ) -> Result<MappedRecord, MappingError> {
        if let Some(field) = self.fields.iter().find(|f| f.source >= row.len()) {
            return Err(MappingError::MissingField {
                column: field.column.clone(),
                position: field.source,
                row_len: row.len(),
            });
        }

        let mut record = MappedRecord::new(&self.target_table);
        for field in &self.fields {
            let cell = row[field.source].as_deref();
            let value = field
                .convert
                .apply(cell, categories)
                .map_err(|e| match e {
                    ConversionError::Required => MappingError::RequiredFieldMissing {
                        column: field.column.clone(),
                    },
                    ConversionError::Invalid(reason) => MappingError::InvalidValue {
                        column: field.column.clone(),
                        value: cell.unwrap_or("NULL").to_string(),
                        reason,
                    },
                })?;
            record.set(&field.column, value);
        }
        Ok(record)
    }

    fn validate(&mut self) -> Result<(), String> {
        self.legacy_table = normalize_identifier(&self.legacy_table);
        if self.legacy_table.is_empty() {
            return Err("legacy_table is empty".to_string());
        }
        if !is_valid_identifier(&self.target_table) {
            return Err(format!("invalid target table name '{}'", self.target_table));
        }
        if self.fields.is_empty() {
            return Err(format!("mapping for {} has no fields", self.target_table));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_valid_identifier(&field.column) {
                return Err(format!(
                    "invalid column name '{}' in {}",
                    field.column, self.target_table
                ));
            }
            if !seen.insert(field.column.as_str()) {
                return Err(format!(
                    "column '{}' mapped twice in {}",
                    field.column, self.target_table
                ));
            }
        }
        for key in &self.unique_key {
            if !seen.contains(key.as_str()) {
                return Err(format!(
                    "unique key column '{}' is not mapped in {}",
                    key, self.target_table
                ));
            }
        }
        Ok(())
    }
}

/// Every table correspondence used by one migration run, in load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSet {
    pub version: u32,
    #[serde(default)]
    pub categories: CategoryTable,
    pub tables: Vec<TableMapping>,
}

impl MappingSet {
    /// The fixed correspondences for the legacy CMS dump.
    pub fn builtin() -> Self {
        use Conversion::*;

        let admin = TableMapping {
            legacy_table: "admin".to_string(),
            target_table: "cms_admin_accounts".to_string(),
            unique_key: vec!["username".to_string()],
            fields: vec![
                FieldSpec::new("legacy_id", 0, Integer),
                FieldSpec::new("username", 1, RequiredText),
                FieldSpec::new("email", 2, Text),
                FieldSpec::new("full_name", 3, Text),
                FieldSpec::new("password_hash", 4, RequiredText),
                FieldSpec::new("admin_type", 5, Text),
                FieldSpec::new("last_login_at", 6, EpochSeconds),
            ],
        };
        let content = TableMapping {
            legacy_table: "content".to_string(),
            target_table: "cms_contents".to_string(),
            unique_key: vec!["legacy_id".to_string()],
            fields: vec![
                FieldSpec::new("legacy_id", 0, Integer),
                FieldSpec::new("title", 1, RequiredText),
                FieldSpec::new("body", 2, Text),
                FieldSpec::new("category", 3, Category),
                FieldSpec::new("link", 4, Text),
                FieldSpec::new("published_at", 5, Datetime),
            ],
        };
        let config_choice = TableMapping {
            legacy_table: "config_choice".to_string(),
            target_table: "cms_config_choices".to_string(),
            unique_key: vec!["choice_group".to_string(), "value".to_string()],
            fields: vec![
                FieldSpec::new("legacy_id", 0, Integer),
                FieldSpec::new("choice_group", 1, RequiredText),
                FieldSpec::new("value", 2, RequiredText),
                FieldSpec::new("label", 3, Text),
                FieldSpec::new("sort_order", 4, Integer),
            ],
        };

        Self {
            version: MAPPING_VERSION,
            categories: CategoryTable::builtin(),
            tables: vec![admin, content, config_choice],
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mut set: MappingSet = serde_yaml::from_str(text)?;
        set.validate().map_err(ConfigError::Invalid)?;
        Ok(set)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::from_yaml_str(&contents)?;
        tracing::info!(
            "Loaded {} table mappings from {}",
            set.tables.len(),
            path.display()
        );
        Ok(set)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check the set and normalize legacy names and category aliases.
    pub fn validate(&mut self) -> Result<(), String> {
        if self.version != MAPPING_VERSION {
            return Err(format!(
                "unsupported mapping version {} (expected {})",
                self.version, MAPPING_VERSION
            ));
        }
        self.categories.validate()?;
        for table in &mut self.tables {
            table.validate()?;
        }
        Ok(())
    }

    pub fn table_for(&self, legacy_table: &str) -> Option<&TableMapping> {
        let name = normalize_identifier(legacy_table);
        self.tables.iter().find(|t| t.legacy_table == name)
    }

    pub fn target_tables(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.target_table.as_str()).collect()
    }
}

impl Default for MappingSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldValue;
    use chrono::DateTime;

    fn cells(values: &[Option<&str>]) -> Vec<Cell> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_admin_row_maps_epoch_login() {
        let set = MappingSet::builtin();
        let admin = set.table_for("admin").unwrap();
        let row = cells(&[
            Some("1"),
            Some("admin"),
            Some("a@x.com"),
            Some("Admin User"),
            Some("hash123"),
            Some("super"),
            Some("1700000000"),
        ]);
        let record = admin.map_row(&row, &set.categories).unwrap();

        assert_eq!(record.table, "cms_admin_accounts");
        assert_eq!(record.get("legacy_id"), Some(&FieldValue::Integer(Some(1))));
        assert_eq!(record.get("username").and_then(FieldValue::as_text), Some("admin"));
        assert_eq!(record.get("email").and_then(FieldValue::as_text), Some("a@x.com"));
        assert_eq!(record.get("full_name").and_then(FieldValue::as_text), Some("Admin User"));
        assert_eq!(record.get("password_hash").and_then(FieldValue::as_text), Some("hash123"));
        assert_eq!(record.get("admin_type").and_then(FieldValue::as_text), Some("super"));
        assert_eq!(
            record.get("last_login_at"),
            Some(&FieldValue::Timestamp(DateTime::from_timestamp(1_700_000_000, 0)))
        );
    }

    #[test]
    fn test_admin_row_without_login_is_absent() {
        let set = MappingSet::builtin();
        let admin = set.table_for("admin").unwrap();
        let row = cells(&[Some("2"), Some("ed"), None, None, Some("h"), None, None]);
        let record = admin.map_row(&row, &set.categories).unwrap();
        assert_eq!(record.get("last_login_at"), Some(&FieldValue::Timestamp(None)));
    }

    #[test]
    fn test_short_row_is_missing_field() {
        let set = MappingSet::builtin();
        let admin = set.table_for("admin").unwrap();
        let row = cells(&[Some("1"), Some("admin"), Some("a@x.com")]);
        let err = admin.map_row(&row, &set.categories).unwrap_err();
        assert_eq!(
            err,
            MappingError::MissingField {
                column: "full_name".to_string(),
                position: 3,
                row_len: 3,
            }
        );
    }

    #[test]
    fn test_content_unknown_category_falls_back() {
        let set = MappingSet::builtin();
        let content = set.table_for("content").unwrap();
        let row = cells(&[
            Some("9"),
            Some("Tillers"),
            Some("..."),
            Some("Machinery Spotlight"),
            None,
            Some("2018-06-01 10:00:00"),
        ]);
        let record = content.map_row(&row, &set.categories).unwrap();
        assert_eq!(record.get("category").and_then(FieldValue::as_text), Some("news"));
    }

    #[test]
    fn test_invalid_integer_reports_column() {
        let set = MappingSet::builtin();
        let choices = set.table_for("config_choice").unwrap();
        let row = cells(&[Some("1"), Some("region"), Some("north"), Some("North"), Some("first")]);
        let err = choices.map_row(&row, &set.categories).unwrap_err();
        assert!(matches!(err, MappingError::InvalidValue { ref column, .. } if column == "sort_order"));
    }

    #[test]
    fn test_builtin_is_valid() {
        let mut set = MappingSet::builtin();
        set.validate().unwrap();
        assert_eq!(set.table_for("admin").unwrap().required_width(), 7);
    }

    #[test]
    fn test_yaml_round_trip_of_builtin() {
        let yaml = MappingSet::builtin().to_yaml().unwrap();
        let loaded = MappingSet::from_yaml_str(&yaml).unwrap();
        assert_eq!(loaded, MappingSet::builtin());
    }

    #[test]
    fn test_yaml_rejects_unmapped_unique_key() {
        let yaml = r#"
version: 1
tables:
  - legacy_table: news
    target_table: cms_contents
    unique_key: [slug]
    fields:
      - { column: legacy_id, source: 0, convert: integer }
"#;
        let err = MappingSet::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("slug"));
    }

    #[test]
    fn test_yaml_rejects_bad_identifier() {
        let yaml = r#"
version: 1
tables:
  - legacy_table: news
    target_table: "cms; DROP TABLE x"
    fields:
      - { column: id, source: 0 }
"#;
        assert!(MappingSet::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_yaml_legacy_name_is_normalized() {
        let yaml = r#"
version: 1
tables:
  - legacy_table: "`News_Items`"
    target_table: cms_contents
    fields:
      - { column: title, source: 1 }
"#;
        let set = MappingSet::from_yaml_str(yaml).unwrap();
        assert!(set.table_for("news_items").is_some());
        assert_eq!(set.categories, CategoryTable::builtin());
    }

    #[test]
    fn test_yaml_category_block() {
        let yaml = r#"
version: 1
categories:
  members: [Webinar, News]
  fallback: News
  aliases:
    Press Release: News
tables:
  - legacy_table: content
    target_table: cms_contents
    unique_key: [legacy_id]
    fields:
      - { column: legacy_id, source: 0, convert: integer }
      - { column: category, source: 1, convert: category }
"#;
        let set = MappingSet::from_yaml_str(yaml).unwrap();
        let content = set.table_for("content").unwrap();
        let row = vec![Some("1".to_string()), Some("Webinar".to_string())];
        let record = content.map_row(&row, &set.categories).unwrap();
        assert_eq!(
            record.get("category"),
            Some(&FieldValue::Text(Some("webinar".to_string())))
        );
        assert_eq!(set.categories.resolve(Some("press release")), "news");
    }
}
