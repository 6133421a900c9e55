//! Lot-level primitives shared by the cascade engines.
//!
//! Every engine starts from the same snapshot read: the purchase line is
//! fetched before any mutation, because dependent rows are matched by the
//! line's *old* lot key while new values are being written.

use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::entities::{
    self, inventory_record, lot_col, purchase, purchase_item, stock_transaction, PurchaseItem,
};
use crate::errors::ServiceError;
use crate::store::{Filter, Query, RowBuilder, StoreClient};

/// Fetches the current state of one purchase line.
pub(crate) async fn fetch_item(
    store: &dyn StoreClient,
    item_id: Uuid,
) -> Result<PurchaseItem, ServiceError> {
    let rows = store
        .select(
            purchase_item::TABLE,
            &Query::filtered(Filter::new().eq(purchase_item::col::ID, item_id)).limit(1),
        )
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase item {} not found", item_id)))?;
    Ok(entities::from_row(purchase_item::TABLE, row)?)
}

/// Lists the current purchase lines of one purchase.
pub(crate) async fn items_of_purchase(
    store: &dyn StoreClient,
    purchase_id: Uuid,
) -> Result<Vec<PurchaseItem>, ServiceError> {
    let rows = store
        .select(
            purchase_item::TABLE,
            &Query::filtered(Filter::new().eq(purchase_item::col::PURCHASE_ID, purchase_id)),
        )
        .await?;
    rows.into_iter()
        .map(|row| entities::from_row(purchase_item::TABLE, row).map_err(ServiceError::from))
        .collect()
}

pub(crate) fn total_of(items: &[PurchaseItem]) -> Decimal {
    items.iter().map(PurchaseItem::line_value).sum()
}

/// Writes a purchase total computed from the given line set.
pub(crate) async fn write_purchase_total(
    store: &dyn StoreClient,
    purchase_id: Uuid,
    items: &[PurchaseItem],
) -> Result<Decimal, ServiceError> {
    let total = total_of(items);
    store
        .update(
            purchase::TABLE,
            &Filter::new().eq(purchase::col::ID, purchase_id),
            RowBuilder::new()
                .set(purchase::col::TOTAL_AMOUNT, total)
                .build(),
        )
        .await?;
    Ok(total)
}

/// Re-reads a purchase's lines and rewrites its total from them.
pub(crate) async fn recalculate_purchase_total(
    store: &dyn StoreClient,
    purchase_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let items = items_of_purchase(store, purchase_id).await?;
    write_purchase_total(store, purchase_id, &items).await
}

/// Existence check across the three tables that can reference a medicine.
/// Any query failure reads as "still referenced": a live catalog row must
/// never be deleted on bad information, only left for a later pass.
pub(crate) async fn medicine_still_referenced(
    store: &dyn StoreClient,
    medicine_id: Uuid,
) -> bool {
    for table in [
        purchase_item::TABLE,
        inventory_record::TABLE,
        stock_transaction::TABLE,
    ] {
        let query =
            Query::filtered(Filter::new().eq(lot_col::MEDICINE_ID, medicine_id)).limit(1);
        match store.select(table, &query).await {
            Ok(rows) if rows.is_empty() => continue,
            Ok(_) => return true,
            Err(err) => {
                warn!(
                    %medicine_id,
                    table,
                    error = %err,
                    "reference check failed, keeping medicine"
                );
                return true;
            }
        }
    }
    false
}
