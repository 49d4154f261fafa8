//! The migration pipeline: parse the dump fully, then load it fully.
//!
//! A [`Migration`] holds only immutable settings. Each call to
//! [`Migration::run`] builds and returns its own log and summary.

use crate::config::MigrationConfig;
use crate::dump::{DumpParser, ParsedDump, ParsedTable, RawRow};
use crate::error::MigrationError;
use crate::loader::{Loader, TableReport};
use crate::mapping::MappingSet;
use crate::migration_log::{EntryKind, LogEntry, MigrationLog, Severity};
use crate::store::DestinationStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Result of one run, returned to the trigger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_operations: usize,
    pub success_count: usize,
    pub skipped_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub tables: Vec<TableReport>,
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatus {
    pub name: String,
    pub row_count: i64,
}

/// Which target tables exist in the destination and how full they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub table_prefix: String,
    pub tables: Vec<TableStatus>,
    /// Mapped target tables that do not exist yet.
    pub missing_tables: Vec<String>,
}

/// The head of one parsed legacy table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub table: String,
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub rows: Vec<RawRow>,
}

impl TablePreview {
    /// Copy the column names and at most `limit` rows of `table`.
    pub fn from_table(table: &ParsedTable, limit: usize) -> Self {
        Self {
            table: table.name.clone(),
            columns: table.columns.clone(),
            total_rows: table.rows.len(),
            rows: table.rows.iter().take(limit).cloned().collect(),
        }
    }
}

pub struct Migration {
    dump_path: PathBuf,
    mappings: MappingSet,
    table_prefix: String,
    parser: DumpParser,
}

impl Migration {
    /// Create a migration over `dump_path` using the default `cms_` prefix.
    pub fn new(dump_path: impl Into<PathBuf>, mappings: MappingSet) -> Self {
        Self {
            dump_path: dump_path.into(),
            mappings,
            table_prefix: crate::config::DEFAULT_TABLE_PREFIX.to_string(),
            parser: DumpParser::new(),
        }
    }

    /// Build from configuration, loading the mapping file when one is set.
    pub fn from_config(config: &MigrationConfig) -> Result<Self, MigrationError> {
        config.validate()?;
        let mappings = match &config.mappings_path {
            Some(path) => MappingSet::load_from_file(path)?,
            None => MappingSet::builtin(),
        };
        for target in mappings.target_tables() {
            if !target.starts_with(&config.table_prefix) {
                tracing::warn!(
                    "Target table {} does not carry prefix '{}' and will not show in status",
                    target,
                    config.table_prefix
                );
            }
        }
        Ok(Self::new(&config.dump_path, mappings).with_table_prefix(&config.table_prefix))
    }

    /// Prefix used to find destination tables in [`Migration::status`].
    pub fn with_table_prefix(mut self, prefix: &str) -> Self {
        self.table_prefix = prefix.to_string();
        self
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }

    pub fn mappings(&self) -> &MappingSet {
        &self.mappings
    }

    /// Phase one: read and parse the dump. Fails when the file is missing.
    pub fn parse(&self) -> Result<ParsedDump, MigrationError> {
        Ok(self.parser.parse_file(&self.dump_path)?)
    }

    /// Parse the dump and load every mapped table.
    pub fn run<S: DestinationStore + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<MigrationSummary, MigrationError> {
        let dump = self.parse()?;
        Ok(self.load(&dump, store))
    }

    /// Phase two: load an already parsed dump.
    pub fn load<S: DestinationStore + ?Sized>(
        &self,
        dump: &ParsedDump,
        store: &mut S,
    ) -> MigrationSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut log = MigrationLog::new();
        log.progress(format!(
            "Migration {} started from {}: {} tables, {} rows parsed",
            run_id,
            self.dump_path.display(),
            dump.table_names().len(),
            dump.total_rows()
        ));
        for warning in dump.warnings() {
            log.record(EntryKind::ParseMalformed, warning.to_string());
        }

        let mut loader = Loader::new(store);
        let mut tables = Vec::with_capacity(self.mappings.tables.len());
        for mapping in &self.mappings.tables {
            match dump.table(&mapping.legacy_table) {
                Some(table) => tables.push(loader.load_table(
                    mapping,
                    &self.mappings.categories,
                    table,
                    &mut log,
                )),
                None => log.record(
                    EntryKind::TableMissing,
                    format!(
                        "Legacy table {} not found in dump; {} not loaded",
                        mapping.legacy_table, mapping.target_table
                    ),
                ),
            }
        }

        let total_operations = tables.iter().map(|t| t.attempted).sum();
        let success_count = tables.iter().map(|t| t.inserted).sum();
        let skipped_count = tables.iter().map(|t| t.skipped).sum();
        log.progress(format!(
            "Migration {} finished: {} operations, {} inserted, {} skipped, {} errors",
            run_id,
            total_operations,
            success_count,
            skipped_count,
            log.count(Severity::Error)
        ));

        MigrationSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total_operations,
            success_count,
            skipped_count,
            warning_count: log.count(Severity::Warning),
            error_count: log.count(Severity::Error),
            tables,
            log: log.into_entries(),
        }
    }

    /// Tables carrying the configured prefix and their row counts.
    pub fn status<S: DestinationStore + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<MigrationStatus, MigrationError> {
        let names = store.list_tables(&self.table_prefix)?;
        let mut tables = Vec::with_capacity(names.len());
        for name in &names {
            let row_count = store.count_rows(name)?;
            tables.push(TableStatus {
                name: name.clone(),
                row_count,
            });
        }
        let missing_tables = self
            .mappings
            .target_tables()
            .into_iter()
            .filter(|t| !names.iter().any(|n| n == t))
            .map(str::to_string)
            .collect();
        Ok(MigrationStatus {
            table_prefix: self.table_prefix.clone(),
            tables,
            missing_tables,
        })
    }

    /// The first `limit` rows of a legacy table as parsed from the dump.
    pub fn preview(&self, table: &str, limit: usize) -> Result<TablePreview, MigrationError> {
        let dump = self.parse()?;
        dump.table(table)
            .map(|t| TablePreview::from_table(t, limit))
            .ok_or_else(|| MigrationError::UnknownTable(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_missing_dump_is_fatal() {
        let migration = Migration::new("/nonexistent/dump.sql", MappingSet::builtin());
        let err = migration.run(&mut MemoryStore::new()).unwrap_err();
        assert!(err.is_source_unavailable());
    }

    #[test]
    fn test_missing_legacy_table_is_warning() {
        let dump = DumpParser::new()
            .parse_str("INSERT INTO config_choice VALUES (1,'region','north','North',1);")
            .unwrap();
        let migration = Migration::new("inline.sql", MappingSet::builtin());
        let mut store = MemoryStore::new();

        let summary = migration.load(&dump, &mut store);

        assert_eq!(summary.total_operations, 1);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.warning_count, 2);
        assert_eq!(summary.error_count, 0);
        assert_eq!(summary.tables.len(), 1);
    }

    #[test]
    fn test_status_reports_missing_targets() {
        let dump = DumpParser::new()
            .parse_str("INSERT INTO config_choice VALUES (1,'region','north','North',1);")
            .unwrap();
        let migration = Migration::new("inline.sql", MappingSet::builtin());
        let mut store = MemoryStore::new();
        migration.load(&dump, &mut store);

        let status = migration.status(&mut store).unwrap();
        assert_eq!(
            status.tables,
            vec![TableStatus {
                name: "cms_config_choices".to_string(),
                row_count: 1,
            }]
        );
        assert_eq!(status.missing_tables, vec!["cms_admin_accounts", "cms_contents"]);
    }

    #[test]
    fn test_preview_limits_rows() {
        let table = ParsedTable {
            name: "content".to_string(),
            columns: vec!["id".to_string()],
            rows: (0..5).map(|i| vec![Some(i.to_string())]).collect(),
        };
        let preview = TablePreview::from_table(&table, 2);
        assert_eq!(preview.total_rows, 5);
        assert_eq!(preview.rows.len(), 2);
    }
}
