use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LotKey;

pub const TABLE: &str = "purchase_items";

pub mod col {
    pub use crate::entities::lot_col::*;

    pub const ID: &str = "id";
    pub const PURCHASE_ID: &str = "purchase_id";
    pub const PHARMACY_ID: &str = "pharmacy_id";
    pub const QUANTITY: &str = "quantity";
    pub const FREE_QUANTITY: &str = "free_quantity";
    pub const PURCHASE_RATE: &str = "purchase_rate";
    pub const MRP: &str = "mrp";
    pub const GROSS_AMOUNT: &str = "gross_amount";
    pub const NET_AMOUNT: &str = "net_amount";
}

/// One purchased lot line. The `(medicine_id, batch_number, expiry_date)`
/// triple must stay unique across lines; the store does not enforce it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub pharmacy_id: Uuid,
    pub medicine_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i32,
    #[serde(default)]
    pub free_quantity: i32,
    pub purchase_rate: Decimal,
    pub mrp: Decimal,
    // Derived server-side from quantity and rate; absent on legacy rows.
    #[serde(default)]
    pub gross_amount: Option<Decimal>,
    #[serde(default)]
    pub net_amount: Option<Decimal>,
}

impl PurchaseItem {
    pub fn lot_key(&self) -> LotKey {
        LotKey {
            medicine_id: self.medicine_id,
            batch_number: self.batch_number.clone(),
            expiry_date: self.expiry_date,
        }
    }

    /// Contribution to the owning purchase total: the stored net amount,
    /// falling back to quantity × rate on rows that predate the derived
    /// columns.
    pub fn line_value(&self) -> Decimal {
        self.net_amount
            .unwrap_or_else(|| Decimal::from(self.quantity) * self.purchase_rate)
    }
}
