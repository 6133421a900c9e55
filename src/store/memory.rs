//! In-memory store backend.
//!
//! Backs the test suite, fixtures, and the offline cleanup binary with the
//! same command semantics as the hosted store: filtered commands, affected-row
//! counts, `TableNotFound` for tables that were never created, and the
//! derived-amount columns on purchase lines that the hosted store maintains
//! server-side. Tables are created explicitly; a command against an unknown
//! table fails the same way a dropped collection does in production.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Filter, Query, Row, SortOrder, StoreClient, StoreError};
use crate::entities::purchase_item;
use crate::store::filter::compare_values;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the store with the given tables present and empty.
    pub fn with_tables<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tables = names
            .into_iter()
            .map(|name| (name.as_ref().to_string(), Vec::new()))
            .collect();
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub async fn create_table(&self, name: &str) {
        self.tables
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Exports all tables as one JSON document, `{table: [rows...]}`.
    pub async fn snapshot(&self) -> Value {
        let tables = self.tables.read().await;
        let map = tables
            .iter()
            .map(|(name, rows)| {
                let rows = rows.iter().cloned().map(Value::Object).collect();
                (name.clone(), Value::Array(rows))
            })
            .collect();
        Value::Object(map)
    }

    /// Builds a store from a snapshot previously produced by [`snapshot`],
    /// or from any `{table: [rows...]}` export.
    pub fn from_snapshot(snapshot: &Value) -> Result<Self, StoreError> {
        let top = snapshot
            .as_object()
            .ok_or_else(|| StoreError::Backend("snapshot is not a JSON object".into()))?;
        let mut tables = HashMap::new();
        for (name, rows) in top {
            let rows = rows
                .as_array()
                .ok_or_else(|| StoreError::MalformedRow {
                    table: name.clone(),
                    reason: "expected an array of rows".into(),
                })?
                .iter()
                .map(|row| {
                    row.as_object().cloned().ok_or_else(|| StoreError::MalformedRow {
                        table: name.clone(),
                        reason: "expected a JSON object row".into(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            tables.insert(name.clone(), rows);
        }
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let mut hits: Vec<Row> = rows
            .iter()
            .filter(|row| query.filter.matches(row))
            .cloned()
            .collect();

        if let Some(order) = &query.order_by {
            hits.sort_by(|a, b| {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ordering =
                    compare_values(left, right).unwrap_or(std::cmp::Ordering::Equal);
                match order.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        row.entry("id".to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        if table == purchase_item::TABLE {
            derive_line_amounts(&mut row);
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filter: &Filter, fields: Row) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let amounts_stale = table == purchase_item::TABLE
            && (fields.contains_key(purchase_item::col::QUANTITY)
                || fields.contains_key(purchase_item::col::PURCHASE_RATE));
        let mut affected = 0;
        for row in rows.iter_mut().filter(|row| filter.matches(row)) {
            for (column, value) in &fields {
                row.insert(column.clone(), value.clone());
            }
            if amounts_stale {
                derive_line_amounts(row);
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }
}

/// The hosted store maintains the gross/net amount columns on purchase lines
/// as computed fields; mirror that whenever quantity or rate lands.
fn derive_line_amounts(row: &mut Row) {
    let quantity = row
        .get(purchase_item::col::QUANTITY)
        .and_then(Value::as_i64);
    let rate = row
        .get(purchase_item::col::PURCHASE_RATE)
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok());
    if let (Some(quantity), Some(rate)) = (quantity, rate) {
        let gross = Decimal::from(quantity) * rate;
        row.insert(
            purchase_item::col::GROSS_AMOUNT.to_string(),
            Value::String(gross.to_string()),
        );
        row.insert(
            purchase_item::col::NET_AMOUNT.to_string(),
            Value::String(gross.to_string()),
        );
    }
}
