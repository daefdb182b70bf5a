//! Column names and the values stored in them.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Name of a column.
///
/// The name is kept as given; it is lower-cased whenever it is rendered into
/// SQL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    /// Creates a field name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name as it appears in SQL.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.0.to_lowercase()
    }

    /// The name in the case it is rendered with, for use as a map key.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self(self.0.to_lowercase())
    }

    /// Returns true if the name is empty or only whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

impl From<&str> for FieldName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FieldName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Builds a list of field names from string literals.
#[must_use]
pub fn fields(names: &[&str]) -> Vec<FieldName> {
    names.iter().map(|n| FieldName::from(*n)).collect()
}

/// A value read from or written to a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// NULL.
    Null,
    /// Text.
    Text(String),
    /// 64-bit integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Point in time, always UTC.
    Timestamp(DateTime<Utc>),
    /// Anything else, carried as JSON and stored as its text form.
    Json(serde_json::Value),
}

impl DbValue {
    /// Returns the value rendered as a quoted SQL literal.
    ///
    /// Every kind except `NULL` and bytes renders inside single quotes, with
    /// embedded quotes doubled. Booleans render as `'1'` / `'0'`, which both
    /// SQLite and PostgreSQL accept for boolean columns.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
            other => quote(&other.to_text()),
        }
    }

    /// Returns the value's plain text form, as it would be stored in a text
    /// column.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::Timestamp(ts) => format_timestamp(ts),
            Self::Json(v) => v.to_string(),
        }
    }

    /// Returns true for `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer value.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the timestamp, parsing text if needed.
    ///
    /// SQLite has no native timestamp type, so timestamps often come back as
    /// text in RFC 3339 or `YYYY-MM-DD HH:MM:SS[.f]` form.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

impl fmt::Display for DbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Renders a timestamp the way it is stored: RFC 3339 with an explicit
/// `+00:00` offset.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parses a stored timestamp.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc())
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        Self::Text(String::from(v))
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for DbValue {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for DbValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for DbValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<DateTime<Utc>> for DbValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<serde_json::Value> for DbValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_field_name_renders_lowercase() {
        let field = FieldName::from("testKey");
        assert_eq!(field.as_str(), "testKey");
        assert_eq!(field.to_sql(), "testkey");
        assert_eq!(field.to_string(), "testkey");
    }

    #[test]
    fn test_blank_field_name() {
        assert!(FieldName::from("  ").is_blank());
        assert!(!FieldName::from("id").is_blank());
    }

    #[test]
    fn test_literal_text_escaping() {
        assert_eq!(DbValue::from("hello").to_sql_literal(), "'hello'");
        assert_eq!(DbValue::from("O'Brien").to_sql_literal(), "'O''Brien'");
    }

    #[test]
    fn test_literal_injection_is_quoted() {
        let value = DbValue::from("'; DROP TABLE users; --");
        assert_eq!(value.to_sql_literal(), "'''; DROP TABLE users; --'");
    }

    #[test]
    fn test_literal_scalars() {
        assert_eq!(DbValue::Null.to_sql_literal(), "NULL");
        assert_eq!(DbValue::Int(42).to_sql_literal(), "'42'");
        assert_eq!(DbValue::Float(2.5).to_sql_literal(), "'2.5'");
        assert_eq!(DbValue::Bool(true).to_sql_literal(), "'1'");
        assert_eq!(DbValue::Bool(false).to_sql_literal(), "'0'");
        assert_eq!(
            DbValue::Bytes(vec![0x48, 0x49]).to_sql_literal(),
            "X'4849'"
        );
    }

    #[test]
    fn test_literal_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            DbValue::Timestamp(ts).to_sql_literal(),
            "'2024-03-01T12:30:00+00:00'"
        );
    }

    #[test]
    fn test_timestamp_parsing() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00+00:00"), Some(ts));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(ts));
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(DbValue::from("2024-03-01 12:30:00").as_timestamp(), Some(ts));
        assert_eq!(DbValue::Int(1).as_timestamp(), None);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(DbValue::from(7_i32), DbValue::Int(7));
        assert_eq!(DbValue::from(None::<i64>), DbValue::Null);
        assert_eq!(DbValue::from(Some("x")), DbValue::Text(String::from("x")));
        assert_eq!(DbValue::from(true), DbValue::Bool(true));
    }
}
