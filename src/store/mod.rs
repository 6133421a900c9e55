//! Store command interface.
//!
//! The backing store is consumed through four filtered commands: select,
//! insert, update, delete. There are no multi-statement transactions and no
//! server-side cascades, so callers sequence commands themselves and every
//! dependent-row mutation is phrased as "rows matching this filter" rather
//! than "this known row", which keeps each step idempotent under retries.

pub mod filter;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use filter::{Condition, Filter, Op, OrderBy, Query, SortOrder};

/// One stored row, as the wire-level JSON document.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("malformed row in table {table}: {reason}")]
    MalformedRow { table: String, reason: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetch rows matching the query, honoring its ordering and limit.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Insert one row; returns the stored row (id assigned when absent).
    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Write `fields` into every row matching the filter; returns affected count.
    async fn update(&self, table: &str, filter: &Filter, fields: Row) -> Result<u64, StoreError>;

    /// Delete every row matching the filter; returns affected count.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError>;
}

/// Maps a missing dependent table to zero affected rows. Deployments are free
/// to drop ledger/snapshot tables they do not use; that must read as "nothing
/// to touch", not as a failure.
pub fn zero_when_missing(result: Result<u64, StoreError>) -> Result<u64, StoreError> {
    match result {
        Err(StoreError::TableNotFound(_)) => Ok(0),
        other => other,
    }
}

/// Incremental builder for partial-field writes.
#[derive(Debug, Default)]
pub struct RowBuilder(Row);

impl RowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &str, value: impl Serialize) -> Self {
        self.0.insert(
            column.to_string(),
            serde_json::to_value(value).unwrap_or(Value::Null),
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn build(self) -> Row {
        self.0
    }
}
