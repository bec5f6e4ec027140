//! # mysql-dump
//!
//! Snapshot-consistent MySQL dump library.
//!
//! A dump reads every table of a database inside one read-only transaction
//! and writes a self-contained SQL document that recreates the schema and
//! data:
//!
//! - **Consistent snapshots**: all tables reflect the same point in time
//! - **Plain, gzip or zip output**, one archive member per table in zip mode
//! - **No clobbering**: an existing destination is never overwritten, and a
//!   failed dump leaves no file behind
//! - **Table subsets** with an optional drop/create database preamble
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_dump::{Config, Dumper, MysqlSource, Sink};
//!
//! #[tokio::main]
//! async fn main() -> mysql_dump::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let destination = config.dump.destination(chrono::Local::now())?;
//!     let sink = Sink::create(&destination, config.dump.mode)?;
//!
//!     let mut source = MysqlSource::connect(&config.source).await?;
//!     let summary = Dumper::new(config.dump.options())
//!         .dump(&mut source, sink)
//!         .await?;
//!     println!("Dumped {} rows", summary.total_rows());
//!     source.close().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod dump;
pub mod error;
pub mod extract;
pub mod sink;
pub mod snapshot;

// Re-exports for convenient access
pub use config::{Config, DumpConfig, SourceConfig, SslMode};
pub use crate::core::{ColumnValue, DumpSource, RowVisitor, SnapshotReader, TableRecord};
pub use drivers::MysqlSource;
pub use dump::{DumpFormat, DumpOptions, DumpSummary, Dumper, TableSummary};
pub use error::{DumpError, Result};
pub use extract::{capture_table, describe_table, extract_rows, RowPayload};
pub use sink::{OutputMode, Sink};
pub use snapshot::Snapshot;
