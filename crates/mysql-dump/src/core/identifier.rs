//! Identifier validation and quoting for driver-issued SQL.
//!
//! Table names cannot be bound as statement parameters, so the MySQL driver
//! splices them into `SHOW CREATE TABLE` and `SELECT *` text. Every name goes
//! through [`quote_mysql`] first: it is validated, then wrapped in backticks
//! with embedded backticks doubled.
//!
//! The rendered dump document does not use these helpers. It prints table
//! names exactly as the server listed them.

use crate::error::{DumpError, Result};

/// Maximum identifier length accepted by MySQL (in characters).
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers longer than MySQL allows
///
/// # Errors
///
/// Returns `DumpError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DumpError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(DumpError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    let chars = name.chars().count();
    if chars > MAX_IDENTIFIER_LENGTH {
        return Err(DumpError::Config(format!(
            "Identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH, chars, name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// Escapes backticks by doubling them and wraps in backticks.
/// Validates the identifier before quoting.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}
