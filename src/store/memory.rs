//! In-process destination store.
//!
//! Honors unique keys the way Postgres does (a key containing `NULL` never
//! conflicts). Backs `--dry-run` and the test suite.

use super::{is_valid_identifier, DestinationStore, InsertOutcome, StoreError};
use crate::mapping::MappedRecord;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: IndexMap<String, Vec<MappedRecord>>,
    keys: HashMap<String, HashSet<Vec<String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows written to `table`, in insert order. Empty for unknown tables.
    pub fn rows(&self, table: &str) -> &[MappedRecord] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tables that received at least one row, in first-insert order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }
}

impl DestinationStore for MemoryStore {
    fn insert(
        &mut self,
        record: &MappedRecord,
        unique_key: &[String],
    ) -> Result<InsertOutcome, StoreError> {
        if !is_valid_identifier(&record.table) {
            return Err(StoreError::InvalidIdentifier(record.table.clone()));
        }
        if let Some(bad) = record.columns().find(|c| !is_valid_identifier(c)) {
            return Err(StoreError::InvalidIdentifier(bad.to_string()));
        }

        if !unique_key.is_empty() {
            let key: Option<Vec<String>> = unique_key
                .iter()
                .map(|col| {
                    record
                        .get(col)
                        .filter(|v| !v.is_null())
                        .map(|v| v.to_string())
                })
                .collect();
            if let Some(key) = key {
                let seen = self.keys.entry(record.table.clone()).or_default();
                if !seen.insert(key) {
                    return Ok(InsertOutcome::Duplicate);
                }
            }
        }

        self.tables
            .entry(record.table.clone())
            .or_default()
            .push(record.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .tables
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    fn count_rows(&mut self, table: &str) -> Result<i64, StoreError> {
        self.tables
            .get(table)
            .map(|rows| rows.len() as i64)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldValue;

    fn account(username: Option<&str>) -> MappedRecord {
        let mut record = MappedRecord::new("cms_admin_accounts");
        record.set("username", FieldValue::Text(username.map(str::to_string)));
        record
    }

    #[test]
    fn test_duplicate_key_is_skipped() {
        let mut store = MemoryStore::new();
        let key = vec!["username".to_string()];
        assert_eq!(store.insert(&account(Some("admin")), &key).unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(&account(Some("admin")), &key).unwrap(), InsertOutcome::Duplicate);
        assert_eq!(store.rows("cms_admin_accounts").len(), 1);
    }

    #[test]
    fn test_null_keys_never_conflict() {
        let mut store = MemoryStore::new();
        let key = vec!["username".to_string()];
        store.insert(&account(None), &key).unwrap();
        store.insert(&account(None), &key).unwrap();
        assert_eq!(store.count_rows("cms_admin_accounts").unwrap(), 2);
    }

    #[test]
    fn test_list_tables_by_prefix() {
        let mut store = MemoryStore::new();
        store.insert(&account(Some("a")), &[]).unwrap();
        store.insert(&MappedRecord::new("legacy_other"), &[]).unwrap();
        assert_eq!(store.list_tables("cms_").unwrap(), vec!["cms_admin_accounts"]);
        assert!(matches!(
            store.count_rows("cms_missing"),
            Err(StoreError::UnknownTable(_))
        ));
    }
}
