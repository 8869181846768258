//! Argument values and their SQL literal encoding.
//!
//! Query arguments are stored as [`Value`]s so that a built query can be
//! rendered either with inlined literals or with placeholders, without
//! rebuilding it.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt::Write;
use uuid::Uuid;

/// A query argument or a decoded column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    /// Comma separated list, e.g. for `id IN (?)`.
    List(Vec<Value>),
    /// An identifier argument. Quoted, never escaped as a value.
    Ident(String),
    /// Trusted SQL, rendered verbatim.
    Safe(String),
}

impl Value {
    /// Identifier argument.
    pub fn ident(name: impl Into<String>) -> Self {
        Value::Ident(name.into())
    }

    /// Verbatim SQL argument.
    pub fn safe(sql: impl Into<String>) -> Self {
        Value::Safe(sql.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form used to match keys across typed and text-decoded rows.
    ///
    /// `Int(7)` and `Text("7")` produce the same key. `Null` has no key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(n) => Some(n.to_string()),
            Value::Text(s) | Value::Ident(s) | Value::Safe(s) => Some(s.clone()),
            Value::Bytes(b) => Some(hex(b)),
            Value::Json(v) => Some(v.to_string()),
            Value::Uuid(u) => Some(u.to_string()),
            Value::Timestamp(ts) => Some(ts.to_rfc3339()),
            Value::List(items) => {
                let keys: Option<Vec<String>> = items.iter().map(Value::as_key).collect();
                keys.map(|k| k.join(","))
            }
        }
    }

    /// Append this value as a SQL literal of `dialect`.
    pub fn append_literal(&self, dialect: Dialect, out: &mut String) {
        match self {
            Value::Null => out.push_str("NULL"),
            Value::Bool(true) => out.push_str("TRUE"),
            Value::Bool(false) => out.push_str("FALSE"),
            Value::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Value::Float(n) => append_float(dialect, out, *n),
            Value::Text(s) => append_string(dialect, out, s),
            Value::Bytes(b) => match dialect {
                Dialect::Postgres => {
                    out.push_str("'\\x");
                    out.push_str(&hex(b));
                    out.push('\'');
                }
                Dialect::MySql | Dialect::Sqlite => {
                    out.push_str("X'");
                    out.push_str(&hex(b));
                    out.push('\'');
                }
            },
            Value::Json(v) => append_string(dialect, out, &v.to_string()),
            Value::Uuid(u) => {
                let _ = write!(out, "'{u}'");
            }
            Value::Timestamp(ts) => match dialect {
                Dialect::Postgres => {
                    let _ = write!(out, "'{}'", ts.to_rfc3339());
                }
                Dialect::MySql | Dialect::Sqlite => {
                    let _ = write!(out, "'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f"));
                }
            },
            Value::List(items) => {
                if items.is_empty() {
                    out.push_str("NULL");
                    return;
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.append_literal(dialect, out);
                }
            }
            Value::Ident(name) => dialect.append_ident(out, name),
            Value::Safe(sql) => out.push_str(sql),
        }
    }

    /// Render this value as a SQL literal of `dialect`.
    pub fn to_literal(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        self.append_literal(dialect, &mut out);
        out
    }
}

fn append_string(dialect: Dialect, out: &mut String, s: &str) {
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' if dialect == Dialect::MySql => out.push_str("\\\\"),
            '\0' => {}
            _ => out.push(ch),
        }
    }
    out.push('\'');
}

fn append_float(dialect: Dialect, out: &mut String, n: f64) {
    if n.is_finite() {
        let _ = write!(out, "{n}");
        return;
    }
    match dialect {
        Dialect::Postgres => {
            let word = if n.is_nan() {
                "NaN"
            } else if n > 0.0 {
                "Infinity"
            } else {
                "-Infinity"
            };
            let _ = write!(out, "'{word}'");
        }
        Dialect::MySql | Dialect::Sqlite => out.push_str("NULL"),
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```ignore
/// q.where_expr("name = ? AND age > ?", args!["alice", 30])
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($arg)),+]
    };
}

/// Decode a Rust value from a column [`Value`].
///
/// Rows fetched through the simple query protocol carry text, so every
/// implementation also parses `Value::Text`.
pub trait FromValue: Sized {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self>;
}

fn mismatch<T>(column: &str, expected: &str, value: &Value) -> OrmResult<T> {
    Err(OrmError::decode(
        column,
        format!("expected {expected}, got {value:?}"),
    ))
}

macro_rules! impl_from_value_int {
    ($($t:ty),*) => {
        $(impl FromValue for $t {
            fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
                match value {
                    Value::Int(n) => <$t>::try_from(*n)
                        .map_err(|e| OrmError::decode(column, e.to_string())),
                    Value::Text(s) => s
                        .trim()
                        .parse::<$t>()
                        .map_err(|e| OrmError::decode(column, e.to_string())),
                    other => mismatch(column, stringify!($t), other),
                }
            }
        })*
    };
}

impl_from_value_int!(i16, i32, i64, u32);

impl FromValue for f64 {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Float(n) => Ok(*n),
            Value::Int(n) => Ok(*n as f64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|e: std::num::ParseFloatError| OrmError::decode(column, e.to_string())),
            other => mismatch(column, "f64", other),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Text(s) => match s.as_str() {
                "t" | "true" | "TRUE" | "1" => Ok(true),
                "f" | "false" | "FALSE" | "0" => Ok(false),
                _ => mismatch(column, "bool", value),
            },
            other => mismatch(column, "bool", other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Null => mismatch(column, "text", value),
            other => other
                .as_key()
                .ok_or_else(|| OrmError::decode(column, "expected text")),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => {
                Uuid::parse_str(s).map_err(|e| OrmError::decode(column, e.to_string()))
            }
            other => mismatch(column, "uuid", other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Text(s) => parse_timestamp(s).ok_or_else(|| {
                OrmError::decode(column, format!("invalid timestamp {s:?}"))
            }),
            other => mismatch(column, "timestamp", other),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    // Postgres text output: `2024-01-02 03:04:05.123+00`
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::Text(s) => {
                serde_json::from_str(s).map_err(|e| OrmError::decode(column, e.to_string()))
            }
            other => mismatch(column, "json", other),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value, _column: &str) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value, column: &str) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}
