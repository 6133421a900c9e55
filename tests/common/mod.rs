//! Shared fixture harness over the in-memory store backend.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use rxstock_api::{
    config::AppConfig,
    entities::{
        self, inventory_record, medicine, pharmacy, purchase, purchase_item, stock_transaction,
        InventoryRecord, LotKey, Medicine, Pharmacy, Purchase, PurchaseItem, StockTransaction,
        StockTransactionType, TABLES,
    },
    services::factory::{build_services, AppServices},
    store::{memory::InMemoryStore, Filter, Query, RowBuilder, StoreClient},
};

pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub config: AppConfig,
    pub services: AppServices,
    pub pharmacy: Pharmacy,
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub async fn harness() -> TestHarness {
    harness_with_retention(2).await
}

pub async fn harness_with_retention(years: u32) -> TestHarness {
    harness_with_store(years, InMemoryStore::with_tables(TABLES.iter().copied())).await
}

/// Harness over a caller-built store, for tests that leave tables out.
pub async fn harness_with_store(years: u32, store: InMemoryStore) -> TestHarness {
    let mut config = AppConfig::default();
    config.retention.years = years;

    let store = Arc::new(store);
    let services = build_services(store.clone(), &config, None);
    let pharmacy = Pharmacy {
        id: Uuid::new_v4(),
        name: "Main Street Pharmacy".to_string(),
        last_expiry_cleanup_at: None,
    };
    let _ = store
        .insert(pharmacy::TABLE, entities::to_row(&pharmacy))
        .await;

    TestHarness {
        store,
        config,
        services,
        pharmacy,
    }
}

impl TestHarness {
    pub async fn seed_pharmacy(&self, name: &str) -> Pharmacy {
        let row = Pharmacy {
            id: Uuid::new_v4(),
            name: name.to_string(),
            last_expiry_cleanup_at: None,
        };
        self.store
            .insert(pharmacy::TABLE, entities::to_row(&row))
            .await
            .unwrap();
        row
    }

    pub async fn seed_medicine(&self, name: &str) -> Medicine {
        let row = Medicine {
            id: Uuid::new_v4(),
            name: name.to_string(),
            manufacturer: "Cipla".to_string(),
            unit_type: "strip".to_string(),
        };
        self.store
            .insert(medicine::TABLE, entities::to_row(&row))
            .await
            .unwrap();
        row
    }

    pub async fn seed_purchase(&self, pharmacy_id: Uuid, invoice: &str) -> Purchase {
        let row = Purchase {
            id: Uuid::new_v4(),
            pharmacy_id,
            supplier_id: Uuid::new_v4(),
            invoice_number: invoice.to_string(),
            purchase_date: date(2024, 1, 5),
            total_amount: Decimal::ZERO,
        };
        self.store
            .insert(purchase::TABLE, entities::to_row(&row))
            .await
            .unwrap();
        row
    }

    /// Seeds a full lot: the purchase line, its stock snapshot, one ledger
    /// row, and a refreshed purchase total. Snapshot/ledger inserts are
    /// skipped silently when their tables were left out of the store.
    pub async fn seed_lot(
        &self,
        purchase: &Purchase,
        medicine: &Medicine,
        batch: &str,
        expiry: NaiveDate,
        quantity: i32,
        rate: Decimal,
        mrp: Decimal,
    ) -> PurchaseItem {
        let item = self
            .seed_line_only(purchase, medicine, batch, expiry, quantity, rate, mrp)
            .await;

        let record = InventoryRecord {
            id: Uuid::new_v4(),
            pharmacy_id: purchase.pharmacy_id,
            medicine_id: medicine.id,
            batch_number: batch.to_string(),
            expiry_date: expiry,
            current_stock: quantity,
            last_purchase_rate: rate,
            current_mrp: mrp,
        };
        let _ = self
            .store
            .insert(inventory_record::TABLE, entities::to_row(&record))
            .await;

        let movement = StockTransaction {
            id: Uuid::new_v4(),
            pharmacy_id: purchase.pharmacy_id,
            medicine_id: medicine.id,
            batch_number: batch.to_string(),
            expiry_date: expiry,
            transaction_type: StockTransactionType::Purchase,
            quantity_in: quantity,
            rate,
            amount: Decimal::from(quantity) * rate,
            reference: Some(purchase.invoice_number.clone()),
            transaction_date: Utc::now(),
        };
        let _ = self
            .store
            .insert(stock_transaction::TABLE, entities::to_row(&movement))
            .await;

        item
    }

    /// Seeds only the purchase line (no snapshot, no ledger row).
    pub async fn seed_line_only(
        &self,
        purchase: &Purchase,
        medicine: &Medicine,
        batch: &str,
        expiry: NaiveDate,
        quantity: i32,
        rate: Decimal,
        mrp: Decimal,
    ) -> PurchaseItem {
        let item = PurchaseItem {
            id: Uuid::new_v4(),
            purchase_id: purchase.id,
            pharmacy_id: purchase.pharmacy_id,
            medicine_id: medicine.id,
            batch_number: batch.to_string(),
            expiry_date: expiry,
            quantity,
            free_quantity: 0,
            purchase_rate: rate,
            mrp,
            gross_amount: None,
            net_amount: None,
        };
        let stored = self
            .store
            .insert(purchase_item::TABLE, entities::to_row(&item))
            .await
            .unwrap();
        let item: PurchaseItem = entities::from_row(purchase_item::TABLE, stored).unwrap();

        self.refresh_purchase_total(purchase.id).await;
        item
    }

    async fn refresh_purchase_total(&self, purchase_id: Uuid) {
        let items = self.items_of(purchase_id).await;
        let total: Decimal = items.iter().map(PurchaseItem::line_value).sum();
        let _ = self
            .store
            .update(
                purchase::TABLE,
                &Filter::new().eq(purchase::col::ID, purchase_id),
                RowBuilder::new()
                    .set(purchase::col::TOTAL_AMOUNT, total)
                    .build(),
            )
            .await;
    }

    async fn all<T: DeserializeOwned>(&self, table: &str, filter: Filter) -> Vec<T> {
        self.store
            .select(table, &Query::filtered(filter))
            .await
            .unwrap()
            .into_iter()
            .map(|row| entities::from_row(table, row).unwrap())
            .collect()
    }

    pub async fn find_item(&self, item_id: Uuid) -> Option<PurchaseItem> {
        self.all(purchase_item::TABLE, Filter::new().eq(purchase_item::col::ID, item_id))
            .await
            .pop()
    }

    pub async fn items_of(&self, purchase_id: Uuid) -> Vec<PurchaseItem> {
        self.all(
            purchase_item::TABLE,
            Filter::new().eq(purchase_item::col::PURCHASE_ID, purchase_id),
        )
        .await
    }

    pub async fn find_purchase(&self, purchase_id: Uuid) -> Option<Purchase> {
        self.all(purchase::TABLE, Filter::new().eq(purchase::col::ID, purchase_id))
            .await
            .pop()
    }

    pub async fn find_medicine(&self, medicine_id: Uuid) -> Option<Medicine> {
        self.all(medicine::TABLE, Filter::new().eq(medicine::col::ID, medicine_id))
            .await
            .pop()
    }

    pub async fn find_pharmacy(&self, pharmacy_id: Uuid) -> Option<Pharmacy> {
        self.all(pharmacy::TABLE, Filter::new().eq(pharmacy::col::ID, pharmacy_id))
            .await
            .pop()
    }

    pub async fn inventory_for(&self, key: &LotKey) -> Vec<InventoryRecord> {
        self.all(inventory_record::TABLE, key.filter()).await
    }

    pub async fn transactions_for(&self, key: &LotKey) -> Vec<StockTransaction> {
        self.all(stock_transaction::TABLE, key.filter()).await
    }
}
