use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "current_inventory";

pub mod col {
    pub use crate::entities::lot_col::*;

    pub const ID: &str = "id";
    pub const PHARMACY_ID: &str = "pharmacy_id";
    pub const CURRENT_STOCK: &str = "current_stock";
    pub const LAST_PURCHASE_RATE: &str = "last_purchase_rate";
    pub const CURRENT_MRP: &str = "current_mrp";
}

/// On-hand snapshot for one lot, zero or one row per lot key. An advisory
/// cache over the purchase lines, tolerant of transient drift.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub medicine_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub current_stock: i32,
    pub last_purchase_rate: Decimal,
    pub current_mrp: Decimal,
}
