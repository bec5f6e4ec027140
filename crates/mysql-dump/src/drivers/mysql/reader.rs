//! MySQL/MariaDB snapshot reader.
//!
//! A [`MysqlSource`] owns one connection. Each dump opens a read-only
//! `REPEATABLE READ` transaction on it with `WITH CONSISTENT SNAPSHOT`, so the
//! read view is fixed when the transaction starts rather than at the first
//! table read. Every query of the dump runs inside that transaction and the
//! transaction is always rolled back.
//!
//! The session time zone is pinned to UTC, which is the zone TIMESTAMP
//! values are dumped in.

use std::time::Instant;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Serialize;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::{Column, Connection, Executor, Row, Statement, Transaction};
use tracing::{debug, info};

use crate::config::{SourceConfig, SslMode};
use crate::core::identifier::quote_mysql;
use crate::core::traits::{DumpSource, RowVisitor, SnapshotReader};
use crate::dump::DUMP_TIME_ZONE;
use crate::error::{DumpError, Result};

use super::values::row_to_values;

/// Issued before each snapshot; applies to the next transaction only.
const SNAPSHOT_ISOLATION: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ";

/// Opens the transaction and creates its read view immediately.
const SNAPSHOT_BEGIN: &str = "START TRANSACTION WITH CONSISTENT SNAPSHOT, READ ONLY";

/// Build sqlx connect options from configuration.
pub fn connect_options(config: &SourceConfig) -> MySqlConnectOptions {
    let ssl_mode = match config.ssl_mode {
        SslMode::Disabled => MySqlSslMode::Disabled,
        SslMode::Preferred => MySqlSslMode::Preferred,
        SslMode::Required => MySqlSslMode::Required,
    };

    MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .ssl_mode(ssl_mode)
        .timezone(Some(DUMP_TIME_ZONE.to_string()))
}

/// Outcome of a connection check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub connected: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connect, ping and disconnect, reporting the outcome instead of failing.
pub async fn health_check(config: &SourceConfig) -> HealthCheckResult {
    let start = Instant::now();
    let outcome = async {
        let mut source = MysqlSource::connect(config).await?;
        let row: MySqlRow = sqlx::query("SELECT VERSION()")
            .fetch_one(&mut source.conn)
            .await
            .map_err(|e| DumpError::query(e, "reading server version"))?;
        let version = row
            .try_get_unchecked::<String, _>(0)
            .map_err(|e| DumpError::query(e, "reading server version"))?;
        source.close().await?;
        Ok::<_, DumpError>(version)
    }
    .await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(version) => HealthCheckResult {
            connected: true,
            latency_ms,
            server_version: Some(version),
            error: None,
        },
        Err(e) => HealthCheckResult {
            connected: false,
            latency_ms,
            server_version: None,
            error: Some(e.to_string()),
        },
    }
}

/// A single MySQL connection that can be dumped.
pub struct MysqlSource {
    conn: MySqlConnection,
}

impl MysqlSource {
    /// Connect using configuration and verify the connection.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let conn = MySqlConnection::connect_with(&connect_options(config))
            .await
            .map_err(DumpError::Connect)?;

        let mut source = Self { conn };
        source.test_connection().await?;

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(source)
    }

    /// Wrap a connection established elsewhere.
    pub fn from_connection(conn: MySqlConnection) -> Self {
        Self { conn }
    }

    /// Give the connection back to the caller.
    pub fn into_inner(self) -> MySqlConnection {
        self.conn
    }

    /// Test the database connection.
    pub async fn test_connection(&mut self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&mut self.conn)
            .await
            .map_err(DumpError::Connect)?;
        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DumpError::query(e, "closing MySQL connection"))
    }
}

#[async_trait]
impl DumpSource for MysqlSource {
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn SnapshotReader + 'a>> {
        (&mut self.conn)
            .execute(SNAPSHOT_ISOLATION)
            .await
            .map_err(|e| DumpError::query(e, "setting snapshot isolation"))?;

        let tx = self
            .conn
            .begin_with(SNAPSHOT_BEGIN)
            .await
            .map_err(|e| DumpError::query(e, "starting snapshot transaction"))?;

        debug!("Started read-only consistent snapshot transaction");
        Ok(Box::new(MysqlSnapshot { tx: Some(tx) }))
    }

    fn db_type(&self) -> &str {
        "mysql"
    }
}

/// Reads through an open transaction. Dropping it rolls back.
struct MysqlSnapshot<'c> {
    tx: Option<Transaction<'c, MySql>>,
}

impl<'c> MysqlSnapshot<'c> {
    fn tx(&mut self) -> Result<&mut Transaction<'c, MySql>> {
        self.tx
            .as_mut()
            .ok_or_else(|| DumpError::query("transaction already ended", "reading snapshot"))
    }

    async fn fetch_text(&mut self, sql: &str, context: &str) -> Result<Option<String>> {
        let tx = self.tx()?;
        let row: MySqlRow = sqlx::query(sql)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| DumpError::query(e, context))?;
        row.try_get_unchecked::<Option<String>, _>(0)
            .map_err(|e| DumpError::query(e, context))
    }
}

#[async_trait]
impl SnapshotReader for MysqlSnapshot<'_> {
    async fn server_version(&mut self) -> Result<String> {
        let context = "reading server version";
        self.fetch_text("SELECT VERSION()", context)
            .await?
            .ok_or_else(|| DumpError::query("server returned no version", context))
    }

    async fn current_database(&mut self) -> Result<String> {
        let context = "reading current database";
        self.fetch_text("SELECT DATABASE()", context)
            .await?
            .ok_or_else(|| DumpError::query("no database selected", context))
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let tx = self.tx()?;
        let rows: Vec<MySqlRow> = sqlx::query("SHOW TABLES")
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| DumpError::query(e, "listing tables"))?;

        let tables = rows
            .iter()
            .map(|row| row.try_get_unchecked::<String, _>(0))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DumpError::query(e, "listing tables"))?;

        debug!("Listed {} tables", tables.len());
        Ok(tables)
    }

    async fn show_create_table(&mut self, name: &str) -> Result<(String, String)> {
        let sql = format!("SHOW CREATE TABLE {}", quote_mysql(name)?);
        let context = format!("describing table {}", name);
        let tx = self.tx()?;

        let row: MySqlRow = sqlx::query(&sql)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| DumpError::query(e, context.as_str()))?;

        let returned = row
            .try_get_unchecked::<String, _>(0)
            .map_err(|e| DumpError::query(e, context.as_str()))?;
        let statement = row
            .try_get_unchecked::<Option<String>, _>(1)
            .map_err(|e| DumpError::query(e, context.as_str()))?
            .unwrap_or_default();

        Ok((returned, statement))
    }

    async fn scan_table(
        &mut self,
        name: &str,
        visitor: &mut (dyn RowVisitor + Send),
    ) -> Result<()> {
        let sql = format!("SELECT * FROM {}", quote_mysql(name)?);
        let context = format!("reading table {}", name);
        let tx = self.tx()?;

        // Column names come from the prepared statement so they are known
        // even when the table has no rows.
        let statement = (&mut **tx)
            .prepare(sql.as_str())
            .await
            .map_err(|e| DumpError::query(e, context.as_str()))?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        visitor.columns(&columns)?;

        let mut rows = statement.query().fetch(&mut **tx);
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| DumpError::query(e, context.as_str()))?
        {
            let values = row_to_values(&row).map_err(|e| DumpError::query(e, context.as_str()))?;
            visitor.row(&values)?;
        }

        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback()
                .await
                .map_err(|e| DumpError::query(e, "rolling back snapshot"))?;
            debug!("Rolled back snapshot transaction");
        }
        Ok(())
    }
}
