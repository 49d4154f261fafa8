//! Row-by-row loader: maps each raw row and writes it to the destination.
//!
//! A row's failure is recorded and the loader moves on; nothing here aborts a
//! table or a run.

use crate::dump::ParsedTable;
use crate::mapping::{CategoryTable, TableMapping};
use crate::migration_log::{EntryKind, MigrationLog};
use crate::store::{DestinationStore, InsertOutcome};
use serde::Serialize;

/// Outcome counts for one legacy table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub legacy_table: String,
    pub target_table: String,
    pub attempted: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Loader<'s, S: DestinationStore + ?Sized> {
    store: &'s mut S,
}

impl<'s, S: DestinationStore + ?Sized> Loader<'s, S> {
    /// Borrow `store` for the duration of a run.
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    /// Map and insert every row of `table`, in dump order.
    pub fn load_table(
        &mut self,
        mapping: &TableMapping,
        categories: &CategoryTable,
        table: &ParsedTable,
        log: &mut MigrationLog,
    ) -> TableReport {
        let mut report = TableReport {
            legacy_table: mapping.legacy_table.clone(),
            target_table: mapping.target_table.clone(),
            ..TableReport::default()
        };

        for (i, row) in table.rows.iter().enumerate() {
            let row_no = i + 1;
            report.attempted += 1;

            let record = match mapping.map_row(row, categories) {
                Ok(record) => record,
                Err(e) => {
                    report.failed += 1;
                    log.record(
                        EntryKind::MappingInvalid,
                        format!("{} row {}: not mapped: {}", mapping.legacy_table, row_no, e),
                    );
                    continue;
                }
            };

            match self.store.insert(&record, &mapping.unique_key) {
                Ok(InsertOutcome::Inserted) => {
                    report.inserted += 1;
                    log.record(
                        EntryKind::Inserted,
                        format!(
                            "{} row {}: inserted into {} ({})",
                            mapping.legacy_table,
                            row_no,
                            mapping.target_table,
                            record.describe_key(&mapping.unique_key)
                        ),
                    );
                }
                Ok(InsertOutcome::Duplicate) => {
                    report.skipped += 1;
                    log.record(
                        EntryKind::PersistConflict,
                        format!(
                            "{} row {}: skipped, {} already has ({})",
                            mapping.legacy_table,
                            row_no,
                            mapping.target_table,
                            record.describe_key(&mapping.unique_key)
                        ),
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    log.record(
                        EntryKind::PersistFailure,
                        format!(
                            "{} row {}: failed to write to {}: {}",
                            mapping.legacy_table, row_no, mapping.target_table, e
                        ),
                    );
                }
            }
        }

        log.progress(format!(
            "{} -> {}: {} rows, {} inserted, {} skipped, {} failed",
            report.legacy_table,
            report.target_table,
            report.attempted,
            report.inserted,
            report.skipped,
            report.failed
        ));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingSet;
    use crate::store::MemoryStore;

    fn admin_table(rows: &[&[Option<&str>]]) -> ParsedTable {
        let mut table = ParsedTable::new("admin");
        table.rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.map(str::to_string)).collect())
            .collect();
        table
    }

    #[test]
    fn test_short_row_does_not_stop_siblings() {
        let set = MappingSet::builtin();
        let mapping = set.table_for("admin").unwrap();
        let table = admin_table(&[
            &[Some("1"), Some("root"), None, None, Some("h1"), None, None],
            &[Some("2"), Some("short")],
            &[Some("3"), Some("ed"), None, None, Some("h3"), None, Some("1700000000")],
        ]);
        let mut store = MemoryStore::new();
        let mut log = MigrationLog::new();

        let report = Loader::new(&mut store).load_table(mapping, &set.categories, &table, &mut log);

        assert_eq!(report.attempted, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(log.count_kind(EntryKind::MappingInvalid), 1);
        assert_eq!(store.rows("cms_admin_accounts").len(), 2);
    }

    #[test]
    fn test_second_pass_is_skipped_not_failed() {
        let set = MappingSet::builtin();
        let mapping = set.table_for("admin").unwrap();
        let table = admin_table(&[&[Some("1"), Some("root"), None, None, Some("h"), None, None]]);
        let mut store = MemoryStore::new();
        let mut log = MigrationLog::new();

        Loader::new(&mut store).load_table(mapping, &set.categories, &table, &mut log);
        let second = Loader::new(&mut store).load_table(mapping, &set.categories, &table, &mut log);

        assert_eq!(second.skipped, 1);
        assert_eq!(second.failed, 0);
        assert_eq!(store.rows("cms_admin_accounts").len(), 1);
    }
}
