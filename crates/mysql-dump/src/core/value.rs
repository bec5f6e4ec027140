//! Column values and their SQL literal form.
//!
//! A dump stores rows as `INSERT ... VALUES (..),(..)` tuples, so every cell
//! read from the server is reduced to a [`ColumnValue`] and then rendered by
//! [`row_literal`].
//!
//! # Literal rules
//!
//! | Value | Literal |
//! |---|---|
//! | SQL NULL | `NULL` |
//! | numbers, booleans | bare text (`42`, `-1.5`, `1`) |
//! | strings, dates, times | `'...'` with escaping below |
//! | binary | `0x` followed by upper-case hex, `''` when empty |
//!
//! Inside quoted strings a single quote is doubled (`'` -> `''`), a backslash
//! is doubled, NUL becomes `\0` and Ctrl-Z (0x1A) becomes `\Z`. Everything else,
//! newlines included, is emitted verbatim.

use std::borrow::Cow;

use crate::error::{DumpError, Result};

/// A single cell read from a table.
///
/// `Null` is the only variant that is not valid; every other variant carries
/// a value present in the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue<'a> {
    /// SQL NULL.
    Null,

    /// Numeric text emitted without quotes (integers, decimals, floats, booleans).
    Number(Cow<'a, str>),

    /// Character data emitted as an escaped, single-quoted string.
    Text(Cow<'a, str>),

    /// Binary data emitted as a hex literal.
    Bytes(Cow<'a, [u8]>),
}

impl<'a> ColumnValue<'a> {
    /// Whether the cell holds a value (as opposed to SQL NULL).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self, ColumnValue::Null)
    }

    /// Build a numeric value from anything displayable.
    pub fn number(v: impl std::fmt::Display) -> ColumnValue<'static> {
        ColumnValue::Number(Cow::Owned(v.to_string()))
    }

    /// Build a text value.
    pub fn text(v: impl Into<Cow<'a, str>>) -> Self {
        ColumnValue::Text(v.into())
    }

    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> ColumnValue<'static> {
        match self {
            ColumnValue::Null => ColumnValue::Null,
            ColumnValue::Number(v) => ColumnValue::Number(Cow::Owned(v.into_owned())),
            ColumnValue::Text(v) => ColumnValue::Text(Cow::Owned(v.into_owned())),
            ColumnValue::Bytes(v) => ColumnValue::Bytes(Cow::Owned(v.into_owned())),
        }
    }

    /// Append the SQL literal for this value to `out`.
    pub fn write_literal(&self, out: &mut String) {
        match self {
            ColumnValue::Null => out.push_str("NULL"),
            ColumnValue::Number(v) => out.push_str(v),
            ColumnValue::Text(v) => {
                out.push('\'');
                escape_into(v, out);
                out.push('\'');
            }
            ColumnValue::Bytes(v) if v.is_empty() => out.push_str("''"),
            ColumnValue::Bytes(v) => {
                out.push_str("0x");
                out.push_str(&hex::encode_upper(v));
            }
        }
    }
}

impl<'a> From<Option<&'a str>> for ColumnValue<'a> {
    fn from(v: Option<&'a str>) -> Self {
        match v {
            Some(s) => ColumnValue::Text(Cow::Borrowed(s)),
            None => ColumnValue::Null,
        }
    }
}

/// Escape a string for use inside a single-quoted SQL literal.
pub fn escape_string(s: &str) -> Cow<'_, str> {
    if !s.contains(['\'', '\\', '\0', '\u{1a}']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    escape_into(s, &mut out);
    Cow::Owned(out)
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\u{1a}' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
}

/// Render one row as a tuple literal `(v1,v2,...)`.
///
/// # Errors
///
/// Returns [`DumpError::EmptySchema`] for a row with no columns. The table
/// name is left empty; callers that know the table replace it.
pub fn row_literal(values: &[ColumnValue<'_>]) -> Result<String> {
    let mut out = String::new();
    push_row_literal(&mut out, values)?;
    Ok(out)
}

/// Append one row tuple literal to `out`.
pub fn push_row_literal(out: &mut String, values: &[ColumnValue<'_>]) -> Result<()> {
    if values.is_empty() {
        return Err(DumpError::empty_schema(""));
    }
    out.push('(');
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        value.write_literal(out);
    }
    out.push(')');
    Ok(())
}
