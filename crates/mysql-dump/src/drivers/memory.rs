//! In-process database used to exercise the engine without a server.
//!
//! [`MemoryDatabase`] is a cheaply cloneable handle to shared tables. Each
//! [`MemorySource::begin`] copies the tables, so a snapshot never sees writes
//! made through the handle afterwards. The handle also exposes counters for
//! open snapshots and row cursors, and a few failure switches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::core::traits::{DumpSource, RowVisitor, SnapshotReader};
use crate::core::value::ColumnValue;
use crate::error::{DumpError, Result};

/// Called with the live database and the table name whenever a scan starts.
pub type ScanHook = Arc<dyn Fn(&MemoryDatabase, &str) + Send + Sync>;

/// A table held in memory.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    create_statement: String,
    columns: Vec<String>,
    rows: Vec<Vec<ColumnValue<'static>>>,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new(name: &str, create_statement: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            create_statement: create_statement.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn with_row(mut self, row: Vec<ColumnValue<'static>>) -> Self {
        self.rows.push(row);
        self
    }
}

#[derive(Default)]
struct State {
    database: String,
    server_version: String,
    tables: Vec<MemoryTable>,
    echo_overrides: HashMap<String, String>,
    fail_begin: bool,
    fail_rollback: bool,
    begins: usize,
    rollbacks: usize,
    open_snapshots: usize,
    open_cursors: usize,
}

/// Shared handle to an in-memory database.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
    hook: Arc<Mutex<Option<ScanHook>>>,
}

impl MemoryDatabase {
    /// Create an empty database.
    pub fn new(database: &str, server_version: &str) -> Self {
        let db = Self::default();
        {
            let mut state = db.lock();
            state.database = database.to_string();
            state.server_version = server_version.to_string();
        }
        db
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a table; tables are listed in insertion order.
    pub fn add_table(&self, table: MemoryTable) {
        self.lock().tables.push(table);
    }

    /// Append a row to an existing table.
    pub fn insert_row(&self, table: &str, row: Vec<ColumnValue<'static>>) -> Result<()> {
        let mut state = self.lock();
        let t = state
            .tables
            .iter_mut()
            .find(|t| t.name == table)
            .ok_or_else(|| DumpError::query(format!("Table '{}' doesn't exist", table), "insert"))?;
        t.rows.push(row);
        Ok(())
    }

    /// Make `SHOW CREATE TABLE` echo `returned` when asked for `requested`.
    pub fn echo_name_as(&self, requested: &str, returned: &str) {
        self.lock()
            .echo_overrides
            .insert(requested.to_string(), returned.to_string());
    }

    /// Make the next snapshots fail to open.
    pub fn fail_begin(&self, fail: bool) {
        self.lock().fail_begin = fail;
    }

    /// Make snapshot rollback report a failure.
    pub fn fail_rollback(&self, fail: bool) {
        self.lock().fail_rollback = fail;
    }

    /// Run `hook` at the start of every table scan.
    pub fn on_scan(&self, hook: impl Fn(&MemoryDatabase, &str) + Send + Sync + 'static) {
        *self.hook.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(hook));
    }

    /// Number of snapshots opened so far.
    pub fn begins(&self) -> usize {
        self.lock().begins
    }

    /// Number of snapshots ended, explicitly or by drop.
    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    /// Snapshots currently open.
    pub fn open_snapshots(&self) -> usize {
        self.lock().open_snapshots
    }

    /// Row cursors currently open.
    pub fn open_cursors(&self) -> usize {
        self.lock().open_cursors
    }

    /// Create a connection to this database.
    pub fn source(&self) -> MemorySource {
        MemorySource { db: self.clone() }
    }
}

/// A connection to a [`MemoryDatabase`].
pub struct MemorySource {
    db: MemoryDatabase,
}

#[async_trait]
impl DumpSource for MemorySource {
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn SnapshotReader + 'a>> {
        let mut state = self.db.lock();
        if state.fail_begin {
            return Err(DumpError::query(
                "Access denied; you need the LOCK TABLES privilege",
                "starting snapshot transaction",
            ));
        }
        state.begins += 1;
        state.open_snapshots += 1;

        let snapshot = MemorySnapshot {
            db: self.db.clone(),
            database: state.database.clone(),
            server_version: state.server_version.clone(),
            tables: state.tables.clone(),
            echo_overrides: state.echo_overrides.clone(),
            open: true,
        };
        debug!("Opened in-memory snapshot of {} tables", snapshot.tables.len());
        Ok(Box::new(snapshot))
    }

    fn db_type(&self) -> &str {
        "memory"
    }
}

struct MemorySnapshot {
    db: MemoryDatabase,
    database: String,
    server_version: String,
    tables: Vec<MemoryTable>,
    echo_overrides: HashMap<String, String>,
    open: bool,
}

impl MemorySnapshot {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DumpError::query("transaction already ended", "reading snapshot"))
        }
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables.iter().find(|t| t.name == name).ok_or_else(|| {
            DumpError::query(
                format!("Table '{}.{}' doesn't exist", self.database, name),
                format!("reading table {}", name),
            )
        })
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let mut state = self.db.lock();
            state.rollbacks += 1;
            state.open_snapshots -= 1;
        }
    }
}

/// Tracks an open row cursor; released on drop.
struct Cursor {
    db: MemoryDatabase,
}

impl Cursor {
    fn open(db: &MemoryDatabase) -> Self {
        db.lock().open_cursors += 1;
        Self { db: db.clone() }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.db.lock().open_cursors -= 1;
    }
}

#[async_trait]
impl SnapshotReader for MemorySnapshot {
    async fn server_version(&mut self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.server_version.clone())
    }

    async fn current_database(&mut self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.database.clone())
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn show_create_table(&mut self, name: &str) -> Result<(String, String)> {
        self.ensure_open()?;
        let table = self.table(name)?;
        let echoed = self
            .echo_overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| table.name.clone());
        Ok((echoed, table.create_statement.clone()))
    }

    async fn scan_table(
        &mut self,
        name: &str,
        visitor: &mut (dyn RowVisitor + Send),
    ) -> Result<()> {
        self.ensure_open()?;
        let _cursor = Cursor::open(&self.db);

        let hook = self.db.hook.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(hook) = hook {
            hook(&self.db, name);
        }

        let table = self.table(name)?;
        visitor.columns(&table.columns)?;
        for row in &table.rows {
            visitor.row(row)?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.close();
        if self.db.lock().fail_rollback {
            return Err(DumpError::query("connection lost", "rolling back snapshot"));
        }
        Ok(())
    }
}

impl Drop for MemorySnapshot {
    fn drop(&mut self) {
        self.close();
    }
}
