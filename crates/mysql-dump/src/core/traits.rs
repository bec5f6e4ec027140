//! Core traits for snapshot-consistent dumps.
//!
//! This module defines the seams between the dump engine and a database:
//!
//! - [`DumpSource`]: an established connection that can open a snapshot
//! - [`SnapshotReader`]: reads schema and rows inside one open snapshot
//! - [`RowVisitor`]: receives column metadata and rows from a table scan
//!
//! Drivers implement the first two; the extractors in [`crate::extract`]
//! implement the visitor. Engine logic (name checks, column checks, value
//! serialization) lives on the engine side so every driver behaves the same.

use async_trait::async_trait;

use crate::error::Result;

use super::value::ColumnValue;

/// A database connection that can be dumped.
///
/// The connection is owned by the caller; the engine only borrows it for the
/// duration of one dump and never opens, pools or closes it.
#[async_trait]
pub trait DumpSource: Send {
    /// Open a read-only, transaction-scoped snapshot.
    ///
    /// Every read made through the returned reader observes the database as it
    /// was when the snapshot was opened. Dropping the reader without calling
    /// [`SnapshotReader::rollback`] must still end the transaction.
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn SnapshotReader + 'a>>;

    /// Get the database type name (e.g., "mysql").
    fn db_type(&self) -> &str;
}

/// Reads schema and data inside an open snapshot.
#[async_trait]
pub trait SnapshotReader: Send {
    /// Server version string (`SELECT VERSION()`).
    async fn server_version(&mut self) -> Result<String>;

    /// Name of the database being dumped (`SELECT DATABASE()`).
    async fn current_database(&mut self) -> Result<String>;

    /// List tables in the order the server returns them.
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Run the native "show create table" query.
    ///
    /// Returns the table name echoed back by the server together with the
    /// creation statement. The caller compares the echoed name.
    async fn show_create_table(&mut self, name: &str) -> Result<(String, String)>;

    /// Stream `SELECT * FROM name` into `visitor`.
    ///
    /// Calls [`RowVisitor::columns`] exactly once before any row. The row
    /// cursor must be released before this returns, whatever the outcome.
    async fn scan_table(&mut self, name: &str, visitor: &mut (dyn RowVisitor + Send))
        -> Result<()>;

    /// End the snapshot without persisting anything.
    ///
    /// Calling it again after a successful rollback is a no-op.
    async fn rollback(&mut self) -> Result<()>;
}

/// Receives the result of a table scan.
pub trait RowVisitor {
    /// Column names in the order the server reports them.
    fn columns(&mut self, names: &[String]) -> Result<()>;

    /// One row, with values in column order.
    fn row(&mut self, values: &[ColumnValue<'_>]) -> Result<()>;
}
