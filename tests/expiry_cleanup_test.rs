mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use common::{date, harness, harness_with_store};
use rust_decimal_macros::dec;

use rxstock_api::config::AppConfig;
use rxstock_api::entities::{inventory_record, stock_transaction, TABLES};
use rxstock_api::services::factory::build_services;
use rxstock_api::store::{
    memory::InMemoryStore, Filter, Query, Row, StoreClient, StoreError,
};

fn current_year() -> i32 {
    Utc::now().year()
}

#[tokio::test]
async fn purges_only_lots_expired_before_the_cutoff() {
    let h = harness().await;
    let y = current_year();
    let med_old = h.seed_medicine("Expired Syrup").await;
    let med_new = h.seed_medicine("Fresh Syrup").await;
    let old_purchase = h.seed_purchase(h.pharmacy.id, "INV-201").await;
    let new_purchase = h.seed_purchase(h.pharmacy.id, "INV-202").await;
    let expired = h
        .seed_lot(&old_purchase, &med_old, "B1", date(y - 3, 6, 15), 10, dec!(5), dec!(7))
        .await;
    let kept = h
        .seed_lot(&new_purchase, &med_new, "B2", date(y - 2, 6, 1), 10, dec!(5), dec!(7))
        .await;

    let report = h.services.expiry_cleanup.run(None).await;

    assert!(report.success, "unexpected failure: {:?}", report.error);
    assert_eq!(report.cutoff_date, Some(date(y - 2, 1, 1)));
    assert_eq!(report.batches_processed, 1);
    assert_eq!(report.stats.purchase_items, 1);
    assert_eq!(report.stats.current_inventory, 1);
    assert_eq!(report.stats.stock_transactions, 1);
    assert_eq!(report.stats.purchases, 1);

    assert!(h.find_item(expired.id).await.is_none());
    assert!(h.find_purchase(old_purchase.id).await.is_none());
    assert!(h.find_item(kept.id).await.is_some());
    assert!(h.find_purchase(new_purchase.id).await.is_some());
}

#[tokio::test]
async fn a_second_run_finds_nothing_left() {
    let h = harness().await;
    let y = current_year();
    let med = h.seed_medicine("Expired Tabs").await;
    let purchase = h.seed_purchase(h.pharmacy.id, "INV-203").await;
    h.seed_lot(&purchase, &med, "B1", date(y - 4, 2, 1), 6, dec!(3), dec!(4))
        .await;

    let first = h.services.expiry_cleanup.run(None).await;
    assert!(first.success);
    assert_eq!(first.batches_processed, 1);

    let second = h.services.expiry_cleanup.run(None).await;
    assert!(second.success);
    assert_eq!(second.batches_processed, 0);
    assert_eq!(second.stats.purchase_items, 0);
}

#[tokio::test]
async fn a_run_with_nothing_to_purge_still_stamps_the_timestamp() {
    let h = harness().await;

    let report = h.services.expiry_cleanup.run(None).await;

    assert!(report.success);
    assert_eq!(report.batches_processed, 0);
    let pharmacy = h.find_pharmacy(h.pharmacy.id).await.unwrap();
    assert!(pharmacy.last_expiry_cleanup_at.is_some());
}

#[tokio::test]
async fn a_scoped_run_leaves_other_pharmacies_untouched() {
    let h = harness().await;
    let y = current_year();
    let other = h.seed_pharmacy("Branch Pharmacy").await;
    let med = h.seed_medicine("Expired Everywhere").await;
    let mine = h.seed_purchase(h.pharmacy.id, "INV-204").await;
    let theirs = h.seed_purchase(other.id, "INV-205").await;
    let my_lot = h
        .seed_lot(&mine, &med, "B1", date(y - 3, 1, 1), 4, dec!(2), dec!(3))
        .await;
    let their_lot = h
        .seed_lot(&theirs, &med, "B2", date(y - 3, 2, 1), 4, dec!(2), dec!(3))
        .await;

    let report = h.services.expiry_cleanup.run(Some(h.pharmacy.id)).await;

    assert!(report.success);
    assert_eq!(report.batches_processed, 1);
    assert!(h.find_item(my_lot.id).await.is_none());
    assert!(h.find_item(their_lot.id).await.is_some());

    let stamped = h.find_pharmacy(h.pharmacy.id).await.unwrap();
    assert!(stamped.last_expiry_cleanup_at.is_some());
    let untouched = h.find_pharmacy(other.id).await.unwrap();
    assert!(untouched.last_expiry_cleanup_at.is_none());
}

#[tokio::test]
async fn a_dry_run_reports_without_mutating() {
    let h = harness().await;
    let y = current_year();
    let med = h.seed_medicine("Expired Ointment").await;
    let purchase = h.seed_purchase(h.pharmacy.id, "INV-206").await;
    let lot = h
        .seed_lot(&purchase, &med, "B7", date(y - 3, 3, 1), 9, dec!(6), dec!(8))
        .await;

    let preview = h.services.expiry_cleanup.preview(None).await.unwrap();

    assert_eq!(preview.cutoff_date, date(y - 2, 1, 1));
    assert_eq!(preview.batches.len(), 1);
    assert_eq!(preview.batches[0].medicine_name, "Expired Ointment");
    assert_eq!(preview.batches[0].batch_number, "B7");
    assert_eq!(preview.estimated.purchase_items, 1);
    assert_eq!(preview.estimated.current_inventory, 1);
    assert_eq!(preview.estimated.stock_transactions, 1);
    assert_eq!(preview.estimated.purchases, 1);

    assert!(h.find_item(lot.id).await.is_some());
    assert!(h.find_purchase(purchase.id).await.is_some());
    let pharmacy = h.find_pharmacy(h.pharmacy.id).await.unwrap();
    assert!(pharmacy.last_expiry_cleanup_at.is_none());
}

#[tokio::test]
async fn a_partially_expired_purchase_is_not_counted_as_removable() {
    let h = harness().await;
    let y = current_year();
    let med_old = h.seed_medicine("Expired Half").await;
    let med_new = h.seed_medicine("Fresh Half").await;
    let purchase = h.seed_purchase(h.pharmacy.id, "INV-207").await;
    h.seed_lot(&purchase, &med_old, "B1", date(y - 3, 3, 1), 9, dec!(6), dec!(8))
        .await;
    h.seed_lot(&purchase, &med_new, "B2", date(y + 1, 3, 1), 9, dec!(6), dec!(8))
        .await;

    let preview = h.services.expiry_cleanup.preview(None).await.unwrap();

    assert_eq!(preview.estimated.purchase_items, 1);
    assert_eq!(preview.estimated.purchases, 0);
}

#[tokio::test]
async fn a_missing_ledger_table_counts_as_zero() {
    let store = InMemoryStore::with_tables(
        TABLES
            .iter()
            .copied()
            .filter(|table| *table != stock_transaction::TABLE),
    );
    let h = harness_with_store(2, store).await;
    let y = current_year();
    let med = h.seed_medicine("Expired No Ledger").await;
    let purchase = h.seed_purchase(h.pharmacy.id, "INV-208").await;
    h.seed_lot(&purchase, &med, "B1", date(y - 3, 3, 1), 9, dec!(6), dec!(8))
        .await;

    let report = h.services.expiry_cleanup.run(None).await;

    assert!(report.success, "unexpected failure: {:?}", report.error);
    assert_eq!(report.batches_processed, 1);
    assert_eq!(report.stats.purchase_items, 1);
    assert_eq!(report.stats.current_inventory, 1);
    assert_eq!(report.stats.stock_transactions, 0);
}

/// Delegating store that fails every delete against one table.
struct FailingDeletes {
    inner: Arc<InMemoryStore>,
    table: &'static str,
}

#[async_trait]
impl StoreClient for FailingDeletes {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, filter: &Filter, fields: Row) -> Result<u64, StoreError> {
        self.inner.update(table, filter, fields).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        if table == self.table {
            return Err(StoreError::Backend("injected delete failure".into()));
        }
        self.inner.delete(table, filter).await
    }
}

#[tokio::test]
async fn an_unexpected_failure_aborts_the_whole_run() {
    let h = harness().await;
    let y = current_year();
    let med = h.seed_medicine("Expired Doomed").await;
    let purchase = h.seed_purchase(h.pharmacy.id, "INV-209").await;
    h.seed_lot(&purchase, &med, "B1", date(y - 3, 3, 1), 9, dec!(6), dec!(8))
        .await;

    let failing = Arc::new(FailingDeletes {
        inner: h.store.clone(),
        table: inventory_record::TABLE,
    });
    let services = build_services(failing, &AppConfig::default(), None);

    let report = services.expiry_cleanup.run(None).await;

    assert!(!report.success);
    assert!(report.error.is_some());
    assert_eq!(report.batches_processed, 0);
    assert_eq!(report.stats.purchase_items, 0);
    assert!(report.cutoff_date.is_some());
}
