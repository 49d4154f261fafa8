//! Field mapping from legacy positional rows to target records.

pub mod category;
pub mod convert;
pub mod record;
pub mod rules;

pub use category::CategoryTable;
pub use convert::{Conversion, ConversionError};
pub use record::{FieldValue, MappedRecord, MappingError};
pub use rules::{FieldSpec, MappingSet, TableMapping, MAPPING_VERSION};
