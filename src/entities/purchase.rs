use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "purchases";

pub mod col {
    pub const ID: &str = "id";
    pub const PHARMACY_ID: &str = "pharmacy_id";
    pub const SUPPLIER_ID: &str = "supplier_id";
    pub const INVOICE_NUMBER: &str = "invoice_number";
    pub const PURCHASE_DATE: &str = "purchase_date";
    pub const TOTAL_AMOUNT: &str = "total_amount";
}

/// One supplier invoice. Owns its purchase lines; removed when the last
/// line goes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub supplier_id: Uuid,
    pub invoice_number: String,
    pub purchase_date: NaiveDate,
    pub total_amount: Decimal,
}
