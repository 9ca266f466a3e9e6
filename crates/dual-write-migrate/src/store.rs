//! Store driver boundary: value/row types and the connection contracts.
//!
//! This library performs no SQL dialect translation and owns no connection
//! pool; both stores are reached through the traits below, implemented by
//! whatever driver layer the platform already offers. Statements forwarded
//! through the proxy must already be valid for both stores (same schema is
//! assumed on both sides).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DualWriteError, Result};

/// SQL value enum for driver-agnostic row and parameter handling.
///
/// Deliberately narrow: the migration core only needs what an id-addressed
/// row can carry. Drivers map their native types into these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer (bigint).
    I64(i64),
    /// 64-bit floating point (double precision).
    F64(f64),
    /// Text/string data.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp in UTC.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Interpret this value as an i64, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Interpret this value as a string slice, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Whether this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

/// One result row: column names plus values in select order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Build a row from parallel column/value lists.
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Row { columns, values }
    }

    /// Look up a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Fetch a required i64 column, failing with a decode error.
    pub fn require_i64(&self, column: &str) -> Result<i64> {
        self.get(column)
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| DualWriteError::decode(format!("missing bigint column `{column}`")))
    }

    /// Fetch a required text column, failing with a decode error.
    pub fn require_text(&self, column: &str) -> Result<String> {
        self.get(column)
            .and_then(SqlValue::as_text)
            .map(str::to_string)
            .ok_or_else(|| DualWriteError::decode(format!("missing text column `{column}`")))
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in select order.
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// Statement surface shared by connection pools and open transactions.
///
/// All methods are deadline-aware in the async sense: dropping the returned
/// future (or wrapping it in `tokio::time::timeout`) abandons the call.
#[async_trait]
pub trait StoreStatements: Send + Sync {
    /// Execute a statement with arguments, returning the affected row count.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a row-set query.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Run a single-row query. `None` means no row matched; drivers must not
    /// surface "no rows" as an error.
    async fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>>;
}

/// A native transaction on one store.
#[async_trait]
pub trait StoreTx: StoreStatements {
    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// A connection pool (or single connection) on one store.
#[async_trait]
pub trait StoreClient: StoreStatements {
    /// Begin a native transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}
