//! Schema and row extraction for a single table.
//!
//! Both extractors run against an open [`SnapshotReader`], so every table of
//! a dump is read from the same point in time.

use tracing::debug;

use crate::core::identifier::validate_identifier;
use crate::core::traits::{RowVisitor, SnapshotReader};
use crate::core::value::{push_row_literal, ColumnValue};
use crate::core::TableRecord;
use crate::error::{DumpError, Result};

/// Fetch the creation statement for a table.
///
/// # Errors
///
/// - [`DumpError::UnexpectedTableName`] if the server echoes a different name
/// - [`DumpError::EmptySchema`] if the server returns no statement
/// - [`DumpError::Query`] for any failure of the underlying query
pub async fn describe_table(reader: &mut dyn SnapshotReader, name: &str) -> Result<String> {
    validate_identifier(name)?;

    let (returned, statement) = reader.show_create_table(name).await?;
    if returned != name {
        return Err(DumpError::UnexpectedTableName {
            requested: name.to_string(),
            returned,
        });
    }
    if statement.trim().is_empty() {
        return Err(DumpError::empty_schema(name));
    }

    Ok(statement)
}

/// Serialized rows of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPayload {
    /// Row tuples joined by commas; empty when the table has no rows.
    pub values: String,

    /// Number of rows serialized.
    pub row_count: u64,
}

/// Read every row of a table and serialize it for a bulk insert.
///
/// # Errors
///
/// - [`DumpError::EmptySchema`] if the table reports zero columns
/// - [`DumpError::Query`] for read failures or rows whose width does not match
///   the reported columns
pub async fn extract_rows(reader: &mut dyn SnapshotReader, name: &str) -> Result<RowPayload> {
    validate_identifier(name)?;

    let mut builder = PayloadBuilder::new(name);
    reader.scan_table(name, &mut builder).await?;
    builder.finish()
}

/// Capture schema and data of one table.
///
/// Nothing is returned unless both steps succeed.
pub async fn capture_table(reader: &mut dyn SnapshotReader, name: &str) -> Result<TableRecord> {
    let create_statement = describe_table(reader, name).await?;
    let payload = extract_rows(reader, name).await?;

    debug!("Captured table {} ({} rows)", name, payload.row_count);

    Ok(TableRecord {
        name: name.to_string(),
        create_statement,
        values: payload.values,
        row_count: payload.row_count,
    })
}

/// Accumulates row tuples while a table is scanned.
struct PayloadBuilder<'n> {
    table: &'n str,
    columns: Option<usize>,
    payload: RowPayload,
}

impl<'n> PayloadBuilder<'n> {
    fn new(table: &'n str) -> Self {
        Self {
            table,
            columns: None,
            payload: RowPayload::default(),
        }
    }

    fn finish(self) -> Result<RowPayload> {
        match self.columns {
            Some(_) => Ok(self.payload),
            None => Err(DumpError::query(
                "scan finished without reporting columns",
                format!("reading table {}", self.table),
            )),
        }
    }
}

impl RowVisitor for PayloadBuilder<'_> {
    fn columns(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Err(DumpError::empty_schema(self.table));
        }
        self.columns = Some(names.len());
        Ok(())
    }

    fn row(&mut self, values: &[ColumnValue<'_>]) -> Result<()> {
        let expected = self.columns.ok_or_else(|| {
            DumpError::query(
                "row received before column metadata",
                format!("reading table {}", self.table),
            )
        })?;
        if values.len() != expected {
            return Err(DumpError::query(
                format!("row has {} values, expected {}", values.len(), expected),
                format!("reading table {}", self.table),
            ));
        }

        if self.payload.row_count > 0 {
            self.payload.values.push(',');
        }
        push_row_literal(&mut self.payload.values, values)
            .map_err(|_| DumpError::empty_schema(self.table))?;
        self.payload.row_count += 1;
        Ok(())
    }
}
