//! Typed rows for the store tables.
//!
//! The store speaks JSON documents; these structs give the engines typed
//! access plus the table and column names used to build filters. Conversions
//! go through serde so the field names double as the wire column names.

pub mod inventory_record;
pub mod medicine;
pub mod pharmacy;
pub mod purchase;
pub mod purchase_item;
pub mod stock_transaction;

use std::fmt;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use inventory_record::InventoryRecord;
pub use medicine::Medicine;
pub use pharmacy::Pharmacy;
pub use purchase::Purchase;
pub use purchase_item::PurchaseItem;
pub use stock_transaction::{StockTransaction, StockTransactionType};

use crate::store::{Filter, Row, StoreError};

/// Every table this crate touches, in dependency order.
pub const TABLES: &[&str] = &[
    pharmacy::TABLE,
    medicine::TABLE,
    purchase::TABLE,
    purchase_item::TABLE,
    inventory_record::TABLE,
    stock_transaction::TABLE,
];

/// Column names shared by every lot-keyed table.
pub mod lot_col {
    pub const MEDICINE_ID: &str = "medicine_id";
    pub const BATCH_NUMBER: &str = "batch_number";
    pub const EXPIRY_DATE: &str = "expiry_date";
}

/// Natural key identifying one purchased lot across the purchase-line,
/// stock-snapshot, and stock-ledger tables.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LotKey {
    pub medicine_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
}

impl LotKey {
    /// Filter matching this lot's rows in any lot-keyed table.
    pub fn filter(&self) -> Filter {
        Filter::new()
            .eq(lot_col::MEDICINE_ID, self.medicine_id)
            .eq(lot_col::BATCH_NUMBER, &self.batch_number)
            .eq(lot_col::EXPIRY_DATE, self.expiry_date)
    }
}

impl fmt::Display for LotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "medicine {} batch {} expiry {}",
            self.medicine_id, self.batch_number, self.expiry_date
        )
    }
}

/// Decodes one stored row into a typed entity.
pub fn from_row<T: DeserializeOwned>(table: &str, row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|err| StoreError::MalformedRow {
        table: table.to_string(),
        reason: err.to_string(),
    })
}

/// Encodes a typed entity as a stored row.
pub fn to_row<T: Serialize>(entity: &T) -> Row {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        _ => Row::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Op;

    #[test]
    fn lot_key_filter_covers_the_triple() {
        let key = LotKey {
            medicine_id: Uuid::nil(),
            batch_number: "B1".into(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        };
        let filter = key.filter();
        let columns: Vec<_> = filter
            .conditions()
            .iter()
            .map(|c| (c.column.as_str(), c.op))
            .collect();
        assert_eq!(
            columns,
            [
                (lot_col::MEDICINE_ID, Op::Eq),
                (lot_col::BATCH_NUMBER, Op::Eq),
                (lot_col::EXPIRY_DATE, Op::Eq),
            ]
        );
    }

    #[test]
    fn row_conversions_round_trip() {
        let medicine = Medicine {
            id: Uuid::new_v4(),
            name: "Amoxicillin".into(),
            manufacturer: "Acme Labs".into(),
            unit_type: "strip".into(),
        };
        let row = to_row(&medicine);
        let back: Medicine = from_row(medicine::TABLE, row).unwrap();
        assert_eq!(back, medicine);
    }
}
