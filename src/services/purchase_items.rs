//! Purchase line edits and their cross-table propagation.
//!
//! The store has no transactions, so an edit is an ordered sequence of
//! filtered commands: validate against the line's old lot key, write the
//! line, then propagate to the stock snapshot, the stock ledger, and the
//! owning purchase total. The line write is the source of truth; the
//! propagation steps are independent and best-effort, and a failure in one
//! neither rolls back completed steps nor stops later ones. Because every
//! propagation is filter-matched, a retried or half-completed edit converges
//! instead of corrupting state.
//!
//! Two simultaneous edits to the same lot are not serialized here; the last
//! write per table wins and the purchase total reflects whichever
//! recomputation ran last.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::entities::{
    self, inventory_record, medicine, purchase_item, stock_transaction, LotKey, Medicine,
    PurchaseItem,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::lots;
use crate::store::{zero_when_missing, Filter, Query, RowBuilder, StoreClient};

/// Partial field set for a purchase line edit. Absent fields stay as they
/// are; `medicine_name` re-points the line at an existing or newly created
/// catalog row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePurchaseItemInput {
    pub quantity: Option<i32>,
    pub free_quantity: Option<i32>,
    pub purchase_rate: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub medicine_name: Option<String>,
}

impl UpdatePurchaseItemInput {
    /// True when the edit touches a field mirrored in the snapshot/ledger
    /// tables.
    fn touches_stock_fields(&self) -> bool {
        self.batch_number.is_some()
            || self.expiry_date.is_some()
            || self.quantity.is_some()
            || self.purchase_rate.is_some()
            || self.mrp.is_some()
    }

    /// True when the edit can change the owning purchase total.
    fn touches_total(&self) -> bool {
        self.quantity.is_some() || self.purchase_rate.is_some() || self.mrp.is_some()
    }
}

/// Service for editing purchase lines
#[derive(Clone)]
pub struct PurchaseItemService {
    store: Arc<dyn StoreClient>,
    event_sender: Option<EventSender>,
}

impl PurchaseItemService {
    pub fn new(store: Arc<dyn StoreClient>, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Fetches one purchase line.
    pub async fn get_item(&self, item_id: Uuid) -> Result<PurchaseItem, ServiceError> {
        lots::fetch_item(self.store.as_ref(), item_id).await
    }

    /// Applies a partial edit to one purchase line and propagates it.
    ///
    /// Fails with `NotFound` when the line does not exist and `Conflict`
    /// when a medicine change would collide with another line's lot key; in
    /// both cases nothing has been written.
    #[instrument(skip_all, fields(%item_id))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdatePurchaseItemInput,
    ) -> Result<PurchaseItem, ServiceError> {
        let store = self.store.as_ref();
        let current = lots::fetch_item(store, item_id).await?;
        let old_key = current.lot_key();

        // Resolve a medicine change up front: the collision check must run
        // against the candidate key before anything is written.
        let new_medicine_id = match &input.medicine_name {
            Some(name) => self.resolve_medicine_change(&current, name, &input).await?,
            None => None,
        };

        let mut fields = RowBuilder::new();
        if let Some(quantity) = input.quantity {
            fields = fields.set(purchase_item::col::QUANTITY, quantity);
        }
        if let Some(free_quantity) = input.free_quantity {
            fields = fields.set(purchase_item::col::FREE_QUANTITY, free_quantity);
        }
        if let Some(rate) = input.purchase_rate {
            fields = fields.set(purchase_item::col::PURCHASE_RATE, rate);
        }
        if let Some(mrp) = input.mrp {
            fields = fields.set(purchase_item::col::MRP, mrp);
        }
        if let Some(batch) = &input.batch_number {
            fields = fields.set(purchase_item::col::BATCH_NUMBER, batch);
        }
        if let Some(expiry) = input.expiry_date {
            fields = fields.set(purchase_item::col::EXPIRY_DATE, expiry);
        }
        if let Some(medicine_id) = new_medicine_id {
            fields = fields.set(purchase_item::col::MEDICINE_ID, medicine_id);
        }
        if fields.is_empty() {
            return Ok(current);
        }

        // The line row is the source of truth; this write must succeed.
        // Gross/net amounts are derived by the store itself.
        store
            .update(
                purchase_item::TABLE,
                &Filter::new().eq(purchase_item::col::ID, item_id),
                fields.build(),
            )
            .await?;

        // Everything below is best-effort propagation keyed on the old lot.
        if input.touches_stock_fields() {
            self.propagate_to_inventory(&old_key, &input).await;
            self.propagate_to_ledger(&old_key, &current, &input).await;
        }
        if input.touches_total() {
            match lots::recalculate_purchase_total(store, current.purchase_id).await {
                Ok(total_amount) => {
                    if let Some(sender) = &self.event_sender {
                        sender
                            .send_or_log(Event::PurchaseTotalRecalculated {
                                purchase_id: current.purchase_id,
                                total_amount,
                            })
                            .await;
                    }
                }
                Err(err) => {
                    error!(
                        purchase_id = %current.purchase_id,
                        error = %err,
                        "failed to recalculate purchase total after line edit"
                    );
                }
            }
        }

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseItemUpdated {
                    item_id,
                    purchase_id: current.purchase_id,
                })
                .await;
        }

        lots::fetch_item(store, item_id).await
    }

    /// Maps a medicine name to a catalog id, creating the row when absent,
    /// and rejects the edit if moving the line onto that medicine would
    /// duplicate another line's lot key.
    async fn resolve_medicine_change(
        &self,
        current: &PurchaseItem,
        name: &str,
        input: &UpdatePurchaseItemInput,
    ) -> Result<Option<Uuid>, ServiceError> {
        let target = self.find_or_create_medicine(name).await?;
        if target.id == current.medicine_id {
            return Ok(None);
        }

        let candidate = LotKey {
            medicine_id: target.id,
            batch_number: input
                .batch_number
                .clone()
                .unwrap_or_else(|| current.batch_number.clone()),
            expiry_date: input.expiry_date.unwrap_or(current.expiry_date),
        };
        self.ensure_lot_key_free(current.id, &candidate).await?;
        Ok(Some(target.id))
    }

    /// Case-sensitive exact-name lookup; inserts a placeholder catalog row
    /// when no match exists.
    async fn find_or_create_medicine(&self, name: &str) -> Result<Medicine, ServiceError> {
        let store = self.store.as_ref();
        let rows = store
            .select(
                medicine::TABLE,
                &Query::filtered(Filter::new().eq(medicine::col::NAME, name)).limit(1),
            )
            .await?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(entities::from_row(medicine::TABLE, row)?);
        }

        let created = Medicine::with_placeholder_details(name);
        let row = store
            .insert(medicine::TABLE, entities::to_row(&created))
            .await?;
        debug!(medicine = name, "created catalog row for renamed line");
        Ok(entities::from_row(medicine::TABLE, row)?)
    }

    /// Rejects the candidate key when any *other* line already holds it.
    async fn ensure_lot_key_free(
        &self,
        item_id: Uuid,
        candidate: &LotKey,
    ) -> Result<(), ServiceError> {
        let query = Query::filtered(
            candidate
                .filter()
                .ne(purchase_item::col::ID, item_id),
        )
        .limit(1);
        let rows = self.store.select(purchase_item::TABLE, &query).await?;
        if rows.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Conflict(format!(
                "Another purchase line already records {}",
                candidate
            )))
        }
    }

    /// Mirrors the edit into the stock snapshot matched by the old lot key.
    /// A missing row means the lot never had a snapshot; zero rows affected
    /// is a normal outcome.
    async fn propagate_to_inventory(&self, lot: &LotKey, input: &UpdatePurchaseItemInput) {
        let mut fields = RowBuilder::new();
        if let Some(batch) = &input.batch_number {
            fields = fields.set(inventory_record::col::BATCH_NUMBER, batch);
        }
        if let Some(expiry) = input.expiry_date {
            fields = fields.set(inventory_record::col::EXPIRY_DATE, expiry);
        }
        if let Some(quantity) = input.quantity {
            fields = fields.set(inventory_record::col::CURRENT_STOCK, quantity);
        }
        if let Some(rate) = input.purchase_rate {
            fields = fields.set(inventory_record::col::LAST_PURCHASE_RATE, rate);
        }
        if let Some(mrp) = input.mrp {
            fields = fields.set(inventory_record::col::CURRENT_MRP, mrp);
        }
        if fields.is_empty() {
            return;
        }

        let result = self
            .store
            .update(inventory_record::TABLE, &lot.filter(), fields.build())
            .await;
        match zero_when_missing(result) {
            Ok(0) => debug!(%lot, "no stock snapshot for lot"),
            Ok(_) => {}
            Err(err) => warn!(%lot, error = %err, "failed to mirror edit into stock snapshot"),
        }
    }

    /// Mirrors the edit into the ledger rows matched by the old lot key,
    /// recomputing the movement amount when quantity or rate moved.
    async fn propagate_to_ledger(
        &self,
        lot: &LotKey,
        current: &PurchaseItem,
        input: &UpdatePurchaseItemInput,
    ) {
        let mut fields = RowBuilder::new();
        if let Some(batch) = &input.batch_number {
            fields = fields.set(stock_transaction::col::BATCH_NUMBER, batch);
        }
        if let Some(expiry) = input.expiry_date {
            fields = fields.set(stock_transaction::col::EXPIRY_DATE, expiry);
        }
        if let Some(quantity) = input.quantity {
            fields = fields.set(stock_transaction::col::QUANTITY_IN, quantity);
        }
        if let Some(rate) = input.purchase_rate {
            fields = fields.set(stock_transaction::col::RATE, rate);
        }
        if input.quantity.is_some() || input.purchase_rate.is_some() {
            let quantity = input.quantity.unwrap_or(current.quantity);
            let rate = input.purchase_rate.unwrap_or(current.purchase_rate);
            fields = fields.set(
                stock_transaction::col::AMOUNT,
                Decimal::from(quantity) * rate,
            );
        }
        if fields.is_empty() {
            return;
        }

        let result = self
            .store
            .update(stock_transaction::TABLE, &lot.filter(), fields.build())
            .await;
        match zero_when_missing(result) {
            Ok(0) => debug!(%lot, "no ledger rows for lot"),
            Ok(_) => {}
            Err(err) => warn!(%lot, error = %err, "failed to mirror edit into stock ledger"),
        }
    }
}
