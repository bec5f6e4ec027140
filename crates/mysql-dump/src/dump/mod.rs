//! Dump sessions: snapshot, extract, render, finish.
//!
//! A [`Dumper`] drives one dump at a time through these steps:
//!
//! 1. open the snapshot on the caller's connection
//! 2. read server version and database name, write the header
//! 3. for each table (listing order, or the caller's subset order), capture
//!    its schema and rows and write its block
//! 4. write the footer with the completion time
//! 5. roll the snapshot back
//! 6. finish the sink
//!
//! Any error aborts the session: the snapshot is still rolled back and the
//! sink is abandoned, removing a destination file it created.

mod template;

pub use template::{DocumentWriter, DumpFormat, DumpHeader, DUMP_TIME_ZONE};

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::traits::DumpSource;
use crate::error::Result;
use crate::extract::capture_table;
use crate::sink::{OutputMode, Sink};
use crate::snapshot::Snapshot;

/// Format of the completion timestamp in the footer.
const COMPLETED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Options for one dump.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Emit `DROP DATABASE` / `CREATE DATABASE` in the header.
    ///
    /// Ignored when `tables` is set.
    pub drop_database: bool,

    /// Dump only these tables, in this order, instead of every table.
    pub tables: Option<Vec<String>>,

    /// Banner and version for the header.
    pub format: DumpFormat,
}

/// Per-table outcome of a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: u64,
}

/// Result of a completed dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpSummary {
    /// Destination file, or `None` for a writer sink.
    pub destination: Option<PathBuf>,

    /// Output mode of the destination.
    pub mode: OutputMode,

    /// Database that was dumped.
    pub database: String,

    /// Server version reported inside the snapshot.
    pub server_version: String,

    /// Tables in the order they were written.
    pub tables: Vec<TableSummary>,

    /// Completion time printed in the footer.
    pub completed_at: String,

    /// Rollback failure message, if the snapshot did not close cleanly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_warning: Option<String>,
}

impl DumpSummary {
    /// Total rows across all tables.
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs dumps with fixed options.
#[derive(Debug, Clone, Default)]
pub struct Dumper {
    options: DumpOptions,
}

struct Written {
    database: String,
    server_version: String,
    tables: Vec<TableSummary>,
    completed_at: String,
}

impl Dumper {
    pub fn new(options: DumpOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    /// Dump to a new file at `path`.
    ///
    /// Fails with [`crate::DumpError::DestinationExists`] before touching the
    /// database if the path is already taken.
    pub async fn dump_to_path<S>(
        &self,
        source: &mut S,
        path: impl AsRef<Path>,
        mode: OutputMode,
    ) -> Result<DumpSummary>
    where
        S: DumpSource + ?Sized,
    {
        let sink = Sink::create(path, mode)?;
        self.dump(source, sink).await
    }

    /// Dump through an already created sink.
    ///
    /// The sink is finished on success and aborted on failure. The summary
    /// reports the sink's own mode.
    pub async fn dump<S>(&self, source: &mut S, mut sink: Sink) -> Result<DumpSummary>
    where
        S: DumpSource + ?Sized,
    {
        let mut snapshot = match Snapshot::begin(source).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                sink.abort();
                return Err(e);
            }
        };

        let written = self.write_document(&mut snapshot, &mut sink).await;
        let rollback_warning = snapshot.release().await.map(|e| e.to_string());

        let written = match written {
            Ok(written) => written,
            Err(e) => {
                sink.abort();
                return Err(e);
            }
        };

        let mode = sink.mode();
        let destination = sink.finish()?;
        info!(
            "Dump of {} completed: {} tables, {} rows",
            written.database,
            written.tables.len(),
            written.tables.iter().map(|t| t.rows).sum::<u64>()
        );

        Ok(DumpSummary {
            destination,
            mode,
            database: written.database,
            server_version: written.server_version,
            tables: written.tables,
            completed_at: written.completed_at,
            rollback_warning,
        })
    }

    async fn write_document(&self, snapshot: &mut Snapshot<'_>, sink: &mut Sink) -> Result<Written> {
        let reader = snapshot.reader();

        let server_version = reader.server_version().await?;
        let database = reader.current_database().await?;

        let (tables, drop_database) = match &self.options.tables {
            Some(tables) => {
                if self.options.drop_database {
                    debug!("Ignoring drop_database for a table subset dump");
                }
                (tables.clone(), false)
            }
            None => (reader.list_tables().await?, self.options.drop_database),
        };
        info!(
            "Dumping {} tables from {} (server {})",
            tables.len(),
            database,
            server_version
        );

        let mut writer = DocumentWriter::new(self.options.format.clone(), sink);
        writer.write_header(&DumpHeader {
            server_version: server_version.clone(),
            database: database.clone(),
            drop_database,
        })?;

        let mut summaries = Vec::with_capacity(tables.len());
        for name in &tables {
            let record = capture_table(reader, name).await?;
            writer.write_table(&record)?;
            summaries.push(TableSummary {
                name: record.name,
                rows: record.row_count,
            });
        }

        let completed_at = Local::now().format(COMPLETED_AT_FORMAT).to_string();
        writer.write_footer(&completed_at)?;

        Ok(Written {
            database,
            server_version,
            tables: summaries,
            completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnValue;
    use crate::drivers::memory::{MemoryDatabase, MemoryTable};
    use crate::error::DumpError;
    use flate2::read::GzDecoder;
    use std::fs::File;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn shop() -> MemoryDatabase {
        let db = MemoryDatabase::new("shop", "8.0.36-log");
        db.add_table(
            MemoryTable::new(
                "users",
                "CREATE TABLE `users` (\n  `id` int NOT NULL,\n  `name` varchar(64)\n)",
                &["id", "name"],
            )
            .with_row(vec![ColumnValue::number(1), ColumnValue::text("O'Brien")])
            .with_row(vec![ColumnValue::number(2), ColumnValue::Null]),
        );
        db.add_table(
            MemoryTable::new(
                "orders",
                "CREATE TABLE `orders` (`id` int, `user_id` int)",
                &["id", "user_id"],
            )
            .with_row(vec![ColumnValue::number(10), ColumnValue::number(1)]),
        );
        db.add_table(MemoryTable::new(
            "audit",
            "CREATE TABLE `audit` (`id` int)",
            &["id"],
        ));
        db
    }

    fn format() -> DumpFormat {
        DumpFormat {
            banner: "Test Dump".into(),
            version: "1.0".into(),
        }
    }

    fn dumper() -> Dumper {
        Dumper::new(DumpOptions {
            format: format(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_plain_dump_document() {
        let db = shop();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.sql");

        let summary = dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("-- Test Dump 1.0\n"));
        assert!(text.contains("-- Server version\t8.0.36-log\n"));
        assert!(text.contains("USE shop;\nSET TIME_ZONE='+00:00';\n"));
        assert_eq!(text.matches("TIME_ZONE").count(), 1);
        assert!(!text.contains("DROP DATABASE"));
        assert!(text.contains("INSERT INTO users VALUES (1,'O''Brien'),(2,NULL);\n"));
        assert!(text.contains("INSERT INTO orders VALUES (10,1);\n"));
        assert!(text.contains("DROP TABLE IF EXISTS audit;\nCREATE TABLE `audit` (`id` int);\n"));
        assert!(!text.contains("INSERT INTO audit"));
        assert!(text.contains(&format!("\n-- Dump completed on {}\n", summary.completed_at)));

        // Listing order is kept
        let users = text.find("table users").unwrap();
        let orders = text.find("table orders").unwrap();
        let audit = text.find("table audit").unwrap();
        assert!(users < orders && orders < audit);

        assert_eq!(summary.destination.as_deref(), Some(path.as_path()));
        assert_eq!(summary.total_rows(), 3);
        assert_eq!(summary.tables.len(), 3);
        assert_eq!(db.open_snapshots(), 0);
        assert_eq!(db.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_drop_database_preamble() {
        let db = shop();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.sql");
        let dumper = Dumper::new(DumpOptions {
            drop_database: true,
            format: format(),
            ..Default::default()
        });

        dumper
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("DROP DATABASE IF EXISTS shop;\nCREATE DATABASE shop;"));
    }

    #[tokio::test]
    async fn test_table_subset_keeps_order_and_skips_preamble() {
        let db = shop();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subset.sql");
        let dumper = Dumper::new(DumpOptions {
            drop_database: true,
            tables: Some(vec!["orders".into(), "users".into()]),
            format: format(),
        });

        let summary = dumper
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap();

        let names: Vec<_> = summary.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["orders", "users"]);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("DROP DATABASE"));
        assert!(!text.contains("audit"));
    }

    #[tokio::test]
    async fn test_second_dump_to_same_path_is_rejected() {
        let db = shop();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.sql");

        dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap();
        let first = std::fs::read(&path).unwrap();

        let err = dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::DestinationExists { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), first);
        // The collision is detected before the database is touched
        assert_eq!(db.begins(), 1);
    }

    #[tokio::test]
    async fn test_gzip_dump() {
        let db = shop();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.sql.gz");

        let summary = dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Gzip)
            .await
            .unwrap();
        assert_eq!(summary.mode, OutputMode::Gzip);

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.starts_with("-- Test Dump 1.0\n"));
        assert!(text.contains("INSERT INTO users VALUES"));
        assert!(text.contains("-- Dump completed on "));
    }

    #[tokio::test]
    async fn test_zip_dump_has_one_member_per_table() {
        let db = MemoryDatabase::new("shop", "8.0.36");
        db.add_table(
            MemoryTable::new("users", "CREATE TABLE `users` (`id` int)", &["id"])
                .with_row(vec![ColumnValue::number(1)]),
        );
        db.add_table(MemoryTable::new(
            "orders",
            "CREATE TABLE `orders` (`id` int)",
            &["id"],
        ));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.zip");

        dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Zip)
            .await
            .unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut names: Vec<_> = archive.file_names().map(|n| n.to_string()).collect();
        names.sort();
        assert_eq!(names, ["orders.sql", "users.sql"]);

        let comment = String::from_utf8(archive.comment().to_vec()).unwrap();
        assert!(comment.starts_with("-- Test Dump 1.0\n"));
        assert!(comment.contains("-- Dump completed on "));

        let mut users = String::new();
        archive
            .by_name("users.sql")
            .unwrap()
            .read_to_string(&mut users)
            .unwrap();
        // Each member restores on its own, so it pins the time zone itself
        let block = format().render_table(&crate::core::TableRecord {
            name: "users".into(),
            create_statement: "CREATE TABLE `users` (`id` int)".into(),
            values: "(1)".into(),
            row_count: 1,
        });
        assert_eq!(users, format!("SET TIME_ZONE='+00:00';\n{}", block));

        let mut orders = String::new();
        archive
            .by_name("orders.sql")
            .unwrap()
            .read_to_string(&mut orders)
            .unwrap();
        assert!(orders.starts_with("SET TIME_ZONE='+00:00';\n"));
        assert!(orders.contains("DROP TABLE IF EXISTS orders;"));
        assert!(!orders.contains("INSERT"));
        assert!(!orders.contains("USE shop;"));
    }

    #[tokio::test]
    async fn test_failed_table_leaves_no_output() {
        let db = shop();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.sql");
        let dumper = Dumper::new(DumpOptions {
            tables: Some(vec!["users".into(), "missing_table".into()]),
            format: format(),
            ..Default::default()
        });

        let err = dumper
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::Query { .. }));
        assert!(!path.exists());
        assert_eq!(db.open_snapshots(), 0);
        assert_eq!(db.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_zero_column_table_fails_without_output() {
        let db = shop();
        db.add_table(MemoryTable::new(
            "shapeless",
            "CREATE TABLE `shapeless` ()",
            &[],
        ));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.sql.gz");

        let err = dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Gzip)
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::EmptySchema { ref table } if table == "shapeless"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_renamed_table_is_rejected() {
        let db = shop();
        db.echo_name_as("orders", "orders_old");
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.sql");

        let err = dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::UnexpectedTableName { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_begin_failure_aborts_before_extraction() {
        let db = shop();
        db.fail_begin(true);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.zip");

        let err = dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Zip)
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::Query { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_successful_dump() {
        let db = shop();
        db.fail_rollback(true);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.sql");

        let summary = dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap();
        assert!(summary.rollback_warning.is_some());
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("-- Dump completed on "));
    }

    #[tokio::test]
    async fn test_concurrent_writes_are_not_visible() {
        let db = shop();
        // Another session writes to `orders` while `users` is being read
        db.on_scan(|live, table| {
            if table == "users" {
                live.insert_row("orders", vec![ColumnValue::number(99), ColumnValue::number(2)])
                    .unwrap();
            }
        });
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.sql");

        let summary = dumper()
            .dump_to_path(&mut db.source(), &path, OutputMode::Plain)
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("INSERT INTO orders VALUES (10,1);\n"));
        assert!(!text.contains("(99,2)"));
        assert_eq!(summary.total_rows(), 3);
    }

    #[tokio::test]
    async fn test_dump_to_writer() {
        use std::io::Write;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Shared(Arc<Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let db = shop();
        let out = Shared::default();
        let summary = dumper()
            .dump(&mut db.source(), Sink::from_writer(out.clone()))
            .await
            .unwrap();

        assert!(summary.destination.is_none());
        assert_eq!(summary.mode, OutputMode::Plain);
        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("USE shop;"));
        assert!(text.ends_with(&format!("-- Dump completed on {}\n", summary.completed_at)));
    }

    #[test]
    fn test_summary_json() {
        let summary = DumpSummary {
            destination: Some(PathBuf::from("/var/tmp/a.sql")),
            mode: OutputMode::Gzip,
            database: "shop".into(),
            server_version: "8.0".into(),
            tables: vec![TableSummary {
                name: "users".into(),
                rows: 2,
            }],
            completed_at: "2024-01-01 00:00:00".into(),
            rollback_warning: None,
        };
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"mode\": \"gzip\""));
        assert!(!json.contains("rollback_warning"));
    }
}
