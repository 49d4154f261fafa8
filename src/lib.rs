//! # legacy-migrate: replay a legacy MySQL dump into the new content schema
//!
//! A migration run has two phases:
//!
//! - **Parse**: [`DumpParser`] reads the dump once and extracts each table's
//!   column names and raw rows. Malformed statements are skipped with a warning.
//! - **Load**: each parsed table is mapped row by row through a [`MappingSet`]
//!   and written to a [`DestinationStore`] with idempotent inserts. Every
//!   outcome lands in the run's [`MigrationLog`].
//!
//! ## Example mapping file
//!
//! ```yaml
//! version: 1
//! tables:
//!   - legacy_table: content
//!     target_table: cms_contents
//!     unique_key: [legacy_id]
//!     fields:
//!       - { column: legacy_id, source: 0, convert: integer }
//!       - { column: title, source: 1 }
//!       - { column: category, source: 3, convert: category }
//! ```

pub mod config;
pub mod dump;
pub mod error;
pub mod loader;
pub mod mapping;
pub mod migration;
pub mod migration_log;
pub mod serialization;
pub mod store;

pub use config::{ConfigError, MigrationConfig};
pub use dump::{DumpParser, ParseError, ParsedDump, ParsedTable};
pub use error::MigrationError;
pub use loader::{Loader, TableReport};
pub use mapping::{FieldValue, MappedRecord, MappingSet, TableMapping};
pub use migration::{Migration, MigrationStatus, MigrationSummary, TablePreview};
pub use migration_log::{EntryKind, LogEntry, MigrationLog, Severity};
pub use store::{DestinationStore, InsertOutcome, MemoryStore, PgStore, StoreError};
