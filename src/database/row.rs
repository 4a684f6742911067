//! Driver-independent result rows handed to collector transforms.

use anyhow::{Result, anyhow};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row as _, TypeInfo};
use std::fmt;

/// A single column value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value; booleans map to 0/1 and text is parsed.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(*f as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One result row: ordered `(column, value)` pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by drivers and tests.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.push((column.to_string(), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Numeric column; missing, NULL or non-numeric values are errors.
    pub fn f64(&self, column: &str) -> Result<f64> {
        self.get(column)
            .ok_or_else(|| anyhow!("column '{column}' not found"))?
            .as_f64()
            .ok_or_else(|| anyhow!("column '{column}' is not numeric"))
    }

    pub fn i64(&self, column: &str) -> Result<i64> {
        self.get(column)
            .ok_or_else(|| anyhow!("column '{column}' not found"))?
            .as_i64()
            .ok_or_else(|| anyhow!("column '{column}' is not an integer"))
    }

    pub fn text(&self, column: &str) -> Result<&str> {
        self.get(column)
            .ok_or_else(|| anyhow!("column '{column}' not found"))?
            .as_str()
            .ok_or_else(|| anyhow!("column '{column}' is not text"))
    }

    /// Text column, falling back to `default` when NULL or missing. Used for labels.
    pub fn label<'a>(&'a self, column: &str, default: &'a str) -> &'a str {
        self.get(column)
            .and_then(Value::as_str)
            .unwrap_or(default)
    }

    /// Convert a `PostgreSQL` row. Types without a mapping decode as NULL; cast
    /// in SQL (`::float8`, `::text`) to get them through.
    pub fn from_pg(row: &PgRow) -> Self {
        let columns = row
            .columns()
            .iter()
            .map(|column| {
                let idx = column.ordinal();
                let type_name = column.type_info().name();
                let value = decode_pg(row, idx, type_name);
                if value == Value::Null && !is_known_pg_type(type_name) {
                    tracing::trace!(
                        column = column.name(),
                        r#type = type_name,
                        "unsupported column type decoded as NULL"
                    );
                }
                (column.name().to_string(), value)
            })
            .collect();

        Self { columns }
    }
}

fn is_known_pg_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "INT2"
            | "INT4"
            | "INT8"
            | "OID"
            | "FLOAT4"
            | "FLOAT8"
            | "BOOL"
            | "TEXT"
            | "VARCHAR"
            | "NAME"
            | "BPCHAR"
            | "CHAR"
    )
}

fn decode_pg(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let decoded: Result<Value, sqlx::Error> = match type_name {
        "INT2" => row.try_get::<Option<i16>, _>(idx).map(|v| v.map(i64::from).into()),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map(|v| v.map(i64::from).into()),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(Into::into),
        "OID" => row
            .try_get::<Option<sqlx::postgres::types::Oid>, _>(idx)
            .map(|v| v.map(|oid| i64::from(oid.0)).into()),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx).map(|v| v.map(f64::from).into()),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(Into::into),
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(Into::into),
        "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => row.try_get::<Option<String>, _>(idx).map(Into::into),
        "CHAR" => row
            .try_get::<Option<i8>, _>(idx)
            .map(|v| v.map(|c| char::from(u8::from_ne_bytes(c.to_ne_bytes())).to_string()).into()),
        _ => Ok(Value::Null),
    };

    decoded.unwrap_or(Value::Null)
}
