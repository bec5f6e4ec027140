//! Database driver implementations.
//!
//! Each driver implements [`DumpSource`](crate::core::DumpSource) and
//! [`SnapshotReader`](crate::core::SnapshotReader):
//!
//! - [`mysql`]: MySQL/MariaDB through sqlx
//! - [`memory`]: in-process tables, used to exercise the engine without a server

pub mod memory;
pub mod mysql;

pub use memory::{MemoryDatabase, MemorySource, MemoryTable};
pub use mysql::MysqlSource;
