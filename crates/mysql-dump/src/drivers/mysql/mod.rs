//! MySQL/MariaDB database driver.
//!
//! This module provides:
//! - [`MysqlSource`]: a connection that opens snapshot transactions for dumps
//! - [`connect_options`]: sqlx connect options built from [`SourceConfig`]
//! - [`health_check`]: connect-and-ping used by the CLI
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+
//!
//! [`SourceConfig`]: crate::config::SourceConfig

mod reader;
mod values;

pub use reader::{connect_options, health_check, HealthCheckResult, MysqlSource};
