//! SQL values, rows, and the owned result cursor shared across drivers.
//!
//! Queries carry positional parameters as `&[Value]` and return a fully
//! materialized [`Rows`] cursor, so consuming results never holds the
//! connection manager's exclusive lock.

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// A driver-agnostic SQL value.
///
/// Mirrors the fundamental SQL storage classes. Conversions from common
/// Rust types (and from [`serde_json::Value`]) are provided so parameter
/// lists stay terse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Name of the storage class, for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
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

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Self>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Integer(i64::from(b)),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || Self::Real(n.as_f64().unwrap_or(0.0)),
                Self::Integer,
            ),
            serde_json::Value::String(s) => Self::Text(s),
            // Compound values are stored as their JSON text
            other => Self::Text(other.to_string()),
        }
    }
}

/// Decodes a [`Value`] into a concrete Rust type.
///
/// Implemented for the types columns are commonly read as; `Option<T>`
/// maps SQL NULL to `None`.
pub trait FromValue: Sized {
    /// Type name used in decode error messages.
    const EXPECTED: &'static str;

    /// Attempts the conversion, `None` on a storage class mismatch.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for u32 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(v) => Self::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "real";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Real(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(v) => Some(*v as Self),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "blob";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Blob(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl<T> FromValue for Option<T>
where
    T: FromValue,
{
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// A single result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Builds a row from column values.
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Decodes the column at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] when the index is out of range or the
    /// column's storage class does not convert to `T`.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or(DbError::Decode {
            index,
            expected: T::EXPECTED,
            actual: "no such column",
        })?;
        T::from_value(value).ok_or_else(|| {
            DbError::Decode {
                index,
                expected: T::EXPECTED,
                actual: value.type_name(),
            }
            .into()
        })
    }

    /// The raw column values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An owned cursor over a query's result set.
///
/// Rows are materialized before the cursor leaves the connection manager,
/// so iteration does not interact with the manager's exclusive lock and
/// dropping the cursor releases everything.
#[derive(Debug)]
pub struct Rows {
    columns: Vec<String>,
    iter: std::vec::IntoIter<Row>,
}

impl Rows {
    /// Builds a cursor from column names and materialized rows.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            iter: rows.into_iter(),
        }
    }

    /// Result column names, in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for Rows {}
