use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "stock_transactions";

pub mod col {
    pub use crate::entities::lot_col::*;

    pub const ID: &str = "id";
    pub const PHARMACY_ID: &str = "pharmacy_id";
    pub const TRANSACTION_TYPE: &str = "transaction_type";
    pub const QUANTITY_IN: &str = "quantity_in";
    pub const RATE: &str = "rate";
    pub const AMOUNT: &str = "amount";
    pub const REFERENCE: &str = "reference";
    pub const TRANSACTION_DATE: &str = "transaction_date";
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StockTransactionType {
    Purchase,
    Sale,
    Adjustment,
}

/// One ledger movement for a lot. Kept for audit history, but edited in
/// place when its purchase line is edited, and removed alongside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub medicine_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub transaction_type: StockTransactionType,
    pub quantity_in: i32,
    pub rate: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
    pub transaction_date: DateTime<Utc>,
}
