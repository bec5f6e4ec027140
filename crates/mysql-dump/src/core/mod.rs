//! Core abstractions shared by the engine and the drivers.
//!
//! - [`value`]: column values and their SQL literal form
//! - [`record`]: the captured state of one table
//! - [`traits`]: seams implemented by database drivers
//! - [`identifier`]: identifier validation and quoting for driver queries

pub mod identifier;
pub mod record;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use record::TableRecord;
pub use traits::{DumpSource, RowVisitor, SnapshotReader};
pub use value::{escape_string, row_literal, ColumnValue};
