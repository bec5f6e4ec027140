//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sink::OutputMode;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database (MySQL) configuration.
    pub source: SourceConfig,

    /// Dump behavior configuration.
    #[serde(default)]
    pub dump: DumpConfig,
}

/// TLS behavior for the source connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Plain TCP only.
    Disabled,
    /// Use TLS when the server offers it.
    #[default]
    Preferred,
    /// Fail unless TLS can be negotiated.
    Required,
}

/// Source database (MySQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database to dump.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// TLS mode (default: preferred).
    #[serde(default)]
    pub ssl_mode: SslMode,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Dump behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Explicit destination path. Overrides `directory` and `name_format`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Directory for generated file names (default: /var/tmp).
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// chrono format string for generated file names.
    #[serde(default = "default_name_format")]
    pub name_format: String,

    /// Output mode (default: plain).
    #[serde(default)]
    pub mode: OutputMode,

    /// Emit the drop/create database preamble (default: false).
    #[serde(default)]
    pub drop_database: bool,

    /// Tables to dump, in order. Empty means every table.
    #[serde(default)]
    pub tables: Vec<String>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            output: None,
            directory: default_directory(),
            name_format: default_name_format(),
            mode: OutputMode::default(),
            drop_database: false,
            tables: Vec::new(),
        }
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_directory() -> PathBuf {
    PathBuf::from("/var/tmp")
}

fn default_name_format() -> String {
    "sqldump-%Y%m%d-%H%M".to_string()
}
