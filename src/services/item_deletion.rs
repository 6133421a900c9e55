//! Purchase line deletion and parent reconciliation.
//!
//! Deleting a line fans out across the four tables in a fixed order: the
//! line itself, its stock snapshot, its ledger rows, then the referenced
//! medicine (when orphaned) and the owning purchase (removed when empty,
//! retotaled otherwise). Dependent rows are matched by the line's lot key,
//! so a repeated or interrupted delete converges. Bulk mode isolates
//! failures per line and never aborts early.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{
    inventory_record, medicine, purchase, purchase_item, stock_transaction, PurchaseItem,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::lots;
use crate::store::{zero_when_missing, Filter, StoreClient};

/// Per-table row counts removed while purging purchase lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LotPurgeStats {
    pub current_inventory: u64,
    pub stock_transactions: u64,
    pub purchase_items: u64,
    pub purchases: u64,
}

impl LotPurgeStats {
    pub fn merge(&mut self, other: &LotPurgeStats) {
        self.current_inventory += other.current_inventory;
        self.stock_transactions += other.stock_transactions;
        self.purchase_items += other.purchase_items;
        self.purchases += other.purchases;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDeletionOutcome {
    pub item_id: Uuid,
    pub purchase_id: Uuid,
    pub purchase_removed: bool,
    pub medicine_reclaimed: bool,
    pub stats: LotPurgeStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDeletion {
    pub id: Uuid,
    pub reason: String,
}

/// Aggregate outcome of a multi-line delete.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDeletionSummary {
    pub deleted: u64,
    pub failed: Vec<FailedDeletion>,
}

/// Service for deleting purchase lines and reconciling their parents
#[derive(Clone)]
pub struct ItemDeletionService {
    store: Arc<dyn StoreClient>,
    event_sender: Option<EventSender>,
}

impl ItemDeletionService {
    pub fn new(store: Arc<dyn StoreClient>, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Deletes one purchase line with its dependents.
    #[instrument(skip_all, fields(%item_id))]
    pub async fn delete_item(&self, item_id: Uuid) -> Result<ItemDeletionOutcome, ServiceError> {
        let item = lots::fetch_item(self.store.as_ref(), item_id).await?;
        self.purge_item(&item).await
    }

    /// Deletes many lines sequentially, isolating failures per line.
    #[instrument(skip_all, fields(count = item_ids.len()))]
    pub async fn delete_items(&self, item_ids: &[Uuid]) -> BulkDeletionSummary {
        let mut summary = BulkDeletionSummary::default();
        for &item_id in item_ids {
            match self.delete_item(item_id).await {
                Ok(_) => summary.deleted += 1,
                Err(err) => {
                    warn!(%item_id, error = %err, "bulk delete: line failed, continuing");
                    summary.failed.push(FailedDeletion {
                        id: item_id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        summary
    }

    /// Purges one already-fetched line and reconciles its parents. The
    /// expiry cleanup drives this same primitive for every expired batch.
    pub(crate) async fn purge_item(
        &self,
        item: &PurchaseItem,
    ) -> Result<ItemDeletionOutcome, ServiceError> {
        let store = self.store.as_ref();
        let lot = item.lot_key();
        let mut stats = LotPurgeStats::default();

        stats.purchase_items = store
            .delete(
                purchase_item::TABLE,
                &Filter::new().eq(purchase_item::col::ID, item.id),
            )
            .await?;
        stats.current_inventory =
            zero_when_missing(store.delete(inventory_record::TABLE, &lot.filter()).await)?;
        stats.stock_transactions =
            zero_when_missing(store.delete(stock_transaction::TABLE, &lot.filter()).await)?;

        let medicine_reclaimed = self.reclaim_medicine_if_unreferenced(item.medicine_id).await;
        let purchase_removed = self.reconcile_purchase(item.purchase_id).await?;
        if purchase_removed {
            stats.purchases = 1;
        }

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseItemDeleted {
                    item_id: item.id,
                    purchase_id: item.purchase_id,
                })
                .await;
        }
        info!(
            item_id = %item.id,
            %lot,
            purchase_removed,
            medicine_reclaimed,
            "purchase line deleted"
        );

        Ok(ItemDeletionOutcome {
            item_id: item.id,
            purchase_id: item.purchase_id,
            purchase_removed,
            medicine_reclaimed,
            stats,
        })
    }

    /// Deletes the medicine when nothing references it anymore. Best-effort:
    /// a failed check or delete leaves the row for a later pass.
    async fn reclaim_medicine_if_unreferenced(&self, medicine_id: Uuid) -> bool {
        if lots::medicine_still_referenced(self.store.as_ref(), medicine_id).await {
            return false;
        }
        let result = self
            .store
            .delete(
                medicine::TABLE,
                &Filter::new().eq(medicine::col::ID, medicine_id),
            )
            .await;
        match zero_when_missing(result) {
            Ok(0) => false,
            Ok(_) => {
                if let Some(sender) = &self.event_sender {
                    sender.send_or_log(Event::MedicineReclaimed(medicine_id)).await;
                }
                info!(%medicine_id, "reclaimed unreferenced medicine");
                true
            }
            Err(err) => {
                warn!(%medicine_id, error = %err, "failed to reclaim medicine");
                false
            }
        }
    }

    /// Removes the purchase when its last line is gone, otherwise rewrites
    /// its total from the remaining lines. Returns whether it was removed.
    async fn reconcile_purchase(&self, purchase_id: Uuid) -> Result<bool, ServiceError> {
        let store = self.store.as_ref();
        let remaining = lots::items_of_purchase(store, purchase_id).await?;

        if remaining.is_empty() {
            let removed = store
                .delete(
                    purchase::TABLE,
                    &Filter::new().eq(purchase::col::ID, purchase_id),
                )
                .await?;
            if removed > 0 {
                if let Some(sender) = &self.event_sender {
                    sender.send_or_log(Event::PurchaseDeleted(purchase_id)).await;
                }
                info!(%purchase_id, "removed purchase with no remaining lines");
            }
            return Ok(removed > 0);
        }

        let total_amount = lots::write_purchase_total(store, purchase_id, &remaining).await?;
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseTotalRecalculated {
                    purchase_id,
                    total_amount,
                })
                .await;
        }
        Ok(false)
    }
}
