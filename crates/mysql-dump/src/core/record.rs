//! Captured table state.

/// One table's schema and data, as captured inside a snapshot.
///
/// Built by [`crate::extract::capture_table`] and consumed by the document
/// writer. The data payload is the comma-joined list of row tuples, ready to
/// follow `INSERT INTO ... VALUES`; it is empty for a table with no rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    /// Table name as listed by the server.
    pub name: String,

    /// `CREATE TABLE` statement, without a trailing semicolon.
    pub create_statement: String,

    /// Serialized rows, e.g. `(1,'a'),(2,NULL)`.
    pub values: String,

    /// Number of rows in `values`.
    pub row_count: u64,
}

impl TableRecord {
    /// Whether the table has rows to insert.
    pub fn has_data(&self) -> bool {
        !self.values.is_empty()
    }
}
