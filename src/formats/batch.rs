use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;

use crate::db::Schema;

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact decimal kept in its textual form
    Numeric(String),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Numeric(_) => "numeric",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Bytes(_) => "bytes",
        }
    }
}

/// An ordered group of records sharing one schema
///
/// Each record is aligned with `schema.columns`, so `rows[r][c]` is the value of
/// column `c` in record `r`.
#[derive(Debug, Clone)]
pub struct RowBatch {
    schema: Arc<Schema>,
    rows: Vec<Vec<Value>>,
}

impl RowBatch {
    pub fn new(schema: Arc<Schema>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == schema.len()));
        Self { schema, rows }
    }

    pub fn empty(schema: Arc<Schema>) -> Self {
        Self::new(schema, Vec::new())
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.column_names()
    }
}
