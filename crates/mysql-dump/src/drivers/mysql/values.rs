//! Conversion of MySQL result cells into [`ColumnValue`]s.
//!
//! Decoding must not lose information: DECIMAL is taken verbatim from the
//! wire text, TIME keeps its sign and full hour range, and zero dates are
//! written back as zeros.

use std::borrow::Cow;

use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::core::value::ColumnValue;

const ZERO_DATE: &str = "0000-00-00";
const ZERO_DATETIME: &str = "0000-00-00 00:00:00";

/// How a column is decoded, derived from its reported type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueKind {
    Signed,
    Unsigned,
    Float,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
    Bytes,
    Text,
}

impl ValueKind {
    /// Classify a MySQL type name as reported by the driver
    /// (e.g. `INT UNSIGNED`, `VARCHAR`, `LONGBLOB`).
    pub(crate) fn from_type_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        let unsigned = upper.ends_with(" UNSIGNED");
        let base = upper.trim_end_matches(" UNSIGNED");

        match base {
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" if unsigned => {
                ValueKind::Unsigned
            }
            // The driver reports every TINYINT(1) as BOOLEAN, but the column
            // still stores the full TINYINT range.
            "BOOLEAN" | "BOOL" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER"
            | "BIGINT" | "YEAR" => ValueKind::Signed,
            "FLOAT" => ValueKind::Float,
            "DOUBLE" | "REAL" => ValueKind::Double,
            "DECIMAL" | "NUMERIC" => ValueKind::Decimal,
            "DATE" => ValueKind::Date,
            "TIME" => ValueKind::Time,
            "DATETIME" | "TIMESTAMP" => ValueKind::DateTime,
            "BIT" | "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
            | "GEOMETRY" => ValueKind::Bytes,
            // CHAR, VARCHAR, TEXT variants, ENUM, SET, JSON
            _ => ValueKind::Text,
        }
    }
}

/// Convert a MySQL row to a vector of column values in column order.
pub(crate) fn row_to_values(row: &MySqlRow) -> Result<Vec<ColumnValue<'static>>, sqlx::Error> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            if row.try_get_raw(i)?.is_null() {
                return Ok(ColumnValue::Null);
            }
            decode(row, i, ValueKind::from_type_name(col.type_info().name()))
        })
        .collect()
}

fn decode(row: &MySqlRow, i: usize, kind: ValueKind) -> Result<ColumnValue<'static>, sqlx::Error> {
    let value = match kind {
        ValueKind::Signed => ColumnValue::number(row.try_get_unchecked::<i64, _>(i)?),
        ValueKind::Unsigned => ColumnValue::number(row.try_get_unchecked::<u64, _>(i)?),
        ValueKind::Float => ColumnValue::number(row.try_get_unchecked::<f32, _>(i)?),
        ValueKind::Double => ColumnValue::number(row.try_get_unchecked::<f64, _>(i)?),
        // Both protocols carry DECIMAL as text.
        ValueKind::Decimal => {
            ColumnValue::Number(Cow::Owned(row.try_get_unchecked::<String, _>(i)?))
        }
        ValueKind::Date if is_zero_temporal(row.try_get_unchecked::<&[u8], _>(i)?) => {
            ColumnValue::Text(Cow::Borrowed(ZERO_DATE))
        }
        ValueKind::Date => ColumnValue::Text(Cow::Owned(format_date(
            row.try_get_unchecked::<chrono::NaiveDate, _>(i)?,
        ))),
        ValueKind::Time => ColumnValue::Text(Cow::Owned(format_time(
            &row.try_get_unchecked::<MySqlTime, _>(i)?,
        ))),
        ValueKind::DateTime if is_zero_temporal(row.try_get_unchecked::<&[u8], _>(i)?) => {
            ColumnValue::Text(Cow::Borrowed(ZERO_DATETIME))
        }
        ValueKind::DateTime => ColumnValue::Text(Cow::Owned(format_datetime(
            row.try_get_unchecked::<chrono::NaiveDateTime, _>(i)?,
        ))),
        ValueKind::Bytes => ColumnValue::Bytes(Cow::Owned(row.try_get_unchecked::<Vec<u8>, _>(i)?)),
        ValueKind::Text => ColumnValue::Text(Cow::Owned(row.try_get_unchecked::<String, _>(i)?)),
    };
    Ok(value)
}

/// Whether a raw DATE/DATETIME cell is the all-zero value.
///
/// The binary protocol sends it as a zero length byte with no payload; the
/// text protocol sends the zeros literally.
fn is_zero_temporal(raw: &[u8]) -> bool {
    matches!(raw, [] | [0]) || raw.starts_with(ZERO_DATE.as_bytes())
}

fn format_date(v: chrono::NaiveDate) -> String {
    v.format("%Y-%m-%d").to_string()
}

fn format_time(v: &MySqlTime) -> String {
    let sign = if v.is_negative() { "-" } else { "" };
    let mut out = format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        v.hours(),
        v.minutes(),
        v.seconds()
    );
    if v.microseconds() != 0 {
        out.push_str(&format!(".{:06}", v.microseconds()));
    }
    out
}

fn format_datetime(v: chrono::NaiveDateTime) -> String {
    v.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::row_literal;
    use chrono::NaiveDate;
    use sqlx::mysql::types::MySqlTimeSign;

    fn time(sign: MySqlTimeSign, hours: u32, minutes: u8, seconds: u8, micros: u32) -> String {
        format_time(&MySqlTime::new(sign, hours, minutes, seconds, micros).unwrap())
    }

    #[test]
    fn test_integer_kinds() {
        assert_eq!(ValueKind::from_type_name("INT"), ValueKind::Signed);
        assert_eq!(ValueKind::from_type_name("BIGINT"), ValueKind::Signed);
        assert_eq!(ValueKind::from_type_name("YEAR"), ValueKind::Signed);
        assert_eq!(ValueKind::from_type_name("INT UNSIGNED"), ValueKind::Unsigned);
        assert_eq!(
            ValueKind::from_type_name("tinyint unsigned"),
            ValueKind::Unsigned
        );
    }

    #[test]
    fn test_tinyint_one_keeps_full_range() {
        // TINYINT(1) holding 5 or -1 must not collapse to 1
        assert_eq!(ValueKind::from_type_name("BOOLEAN"), ValueKind::Signed);
        assert_eq!(ValueKind::from_type_name("BOOL"), ValueKind::Signed);
    }

    #[test]
    fn test_numeric_kinds() {
        assert_eq!(ValueKind::from_type_name("FLOAT"), ValueKind::Float);
        assert_eq!(ValueKind::from_type_name("DOUBLE"), ValueKind::Double);
        assert_eq!(ValueKind::from_type_name("DECIMAL"), ValueKind::Decimal);
        assert_eq!(ValueKind::from_type_name("NUMERIC"), ValueKind::Decimal);
    }

    #[test]
    fn test_wide_decimal_is_written_verbatim() {
        for text in [
            "12345678901234567890123456789012.5",
            "0.123456789012345678901234567890123",
            "-99999999999999999999999999999999999999999999999999999999999999999",
        ] {
            let value = ColumnValue::Number(Cow::Owned(text.to_string()));
            assert_eq!(row_literal(&[value]).unwrap(), format!("({})", text));
        }
    }

    #[test]
    fn test_binary_and_text_kinds() {
        for name in ["BLOB", "LONGBLOB", "VARBINARY", "BINARY", "BIT"] {
            assert_eq!(ValueKind::from_type_name(name), ValueKind::Bytes, "{}", name);
        }
        for name in ["VARCHAR", "CHAR", "TEXT", "LONGTEXT", "ENUM", "SET", "JSON"] {
            assert_eq!(ValueKind::from_type_name(name), ValueKind::Text, "{}", name);
        }
    }

    #[test]
    fn test_time_keeps_sign_and_hours() {
        assert_eq!(time(MySqlTimeSign::Positive, 8, 5, 3, 0), "08:05:03");
        assert_eq!(time(MySqlTimeSign::Negative, 1, 30, 0, 0), "-01:30:00");
        assert_eq!(time(MySqlTimeSign::Positive, 838, 59, 59, 0), "838:59:59");
        assert_eq!(time(MySqlTimeSign::Negative, 838, 59, 59, 0), "-838:59:59");
        assert_eq!(time(MySqlTimeSign::Positive, 0, 0, 1, 5), "00:00:01.000005");
        assert_eq!(format_time(&MySqlTime::ZERO), "00:00:00");
    }

    #[test]
    fn test_zero_temporal_detection() {
        // binary protocol: length byte 0, nothing else
        assert!(is_zero_temporal(&[0]));
        assert!(is_zero_temporal(&[]));
        // text protocol
        assert!(is_zero_temporal(b"0000-00-00"));
        assert!(is_zero_temporal(b"0000-00-00 00:00:00"));

        // 2024-02-29 in binary form, and as text
        assert!(!is_zero_temporal(&[4, 0xe8, 0x07, 2, 29]));
        assert!(!is_zero_temporal(b"2024-02-29"));
    }

    #[test]
    fn test_temporal_formatting() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(format_date(date), "2024-02-29");

        let dt = date.and_hms_micro_opt(23, 59, 58, 250_000).unwrap();
        assert_eq!(format_datetime(dt), "2024-02-29 23:59:58.250");
        assert_eq!(
            format_datetime(date.and_hms_opt(0, 0, 0).unwrap()),
            "2024-02-29 00:00:00"
        );
    }
}
