//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::error::{DumpError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(DumpError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(DumpError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(DumpError::Config("source.user is required".into()));
    }
    if config.source.port == 0 {
        return Err(DumpError::Config("source.port must be at least 1".into()));
    }

    // Dump validation
    if config.dump.name_format.trim().is_empty() {
        return Err(DumpError::Config("dump.name_format cannot be empty".into()));
    }
    let mut seen = HashSet::new();
    for table in &config.dump.tables {
        validate_identifier(table).map_err(|e| match e {
            DumpError::Config(msg) => DumpError::Config(format!("dump.tables: {}", msg)),
            other => other,
        })?;
        if !seen.insert(table.as_str()) {
            return Err(DumpError::Config(format!(
                "dump.tables: table '{}' is listed more than once",
                table
            )));
        }
    }

    Ok(())
}
