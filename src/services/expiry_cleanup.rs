//! Yearly purge of batches that expired beyond the retention window.
//!
//! The cleanup is a batch driver over the same purge primitive interactive
//! deletes use: enumerate every purchase line whose expiry date precedes the
//! cutoff, purge each in expiry order, then stamp the scope's last-cleanup
//! timestamp. Re-running is safe at any time; already-purged batches simply
//! no longer enumerate. Intended to run once a year per pharmacy.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::RetentionConfig;
use crate::entities::{
    self, inventory_record, medicine, pharmacy, purchase_item, stock_transaction, PurchaseItem,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::item_deletion::{ItemDeletionService, LotPurgeStats};
use crate::store::{zero_when_missing, Filter, Query, RowBuilder, StoreClient, StoreError};

/// Outcome of one cleanup run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub success: bool,
    pub message: String,
    pub cutoff_date: Option<NaiveDate>,
    pub batches_processed: u64,
    pub stats: LotPurgeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CleanupReport {
    fn failure(message: impl Into<String>, cutoff_date: Option<NaiveDate>, error: String) -> Self {
        Self {
            success: false,
            message: message.into(),
            cutoff_date,
            batches_processed: 0,
            stats: LotPurgeStats::default(),
            error: Some(error),
        }
    }
}

/// One batch a dry run would purge.
#[derive(Debug, Clone, Serialize)]
pub struct ExpiredBatch {
    pub item_id: Uuid,
    pub purchase_id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i32,
}

/// Dry-run result: the batches a real run would purge plus estimated
/// per-table row counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupPreview {
    pub cutoff_date: NaiveDate,
    pub batches: Vec<ExpiredBatch>,
    pub estimated: LotPurgeStats,
}

struct ExpiredLot {
    item: PurchaseItem,
    medicine_name: String,
}

/// Service purging expired batches past the retention window
#[derive(Clone)]
pub struct ExpiryCleanupService {
    store: Arc<dyn StoreClient>,
    deletion: ItemDeletionService,
    retention: RetentionConfig,
    event_sender: Option<EventSender>,
}

impl ExpiryCleanupService {
    pub fn new(
        store: Arc<dyn StoreClient>,
        deletion: ItemDeletionService,
        retention: RetentionConfig,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            store,
            deletion,
            retention,
            event_sender,
        }
    }

    /// Purges every batch expired before the retention cutoff, for one
    /// pharmacy or, with no scope, for all of them.
    ///
    /// Returns a report rather than an error: an unexpected store failure
    /// aborts the run and is folded into a `success = false` report with no
    /// partial counts.
    #[instrument(skip_all, fields(?pharmacy_id, retention_years = self.retention.years))]
    pub async fn run(&self, pharmacy_id: Option<Uuid>) -> CleanupReport {
        let today = Utc::now().date_naive();
        let cutoff = match cutoff_date(today, self.retention.years) {
            Some(cutoff) => cutoff,
            None => {
                return CleanupReport::failure(
                    "Expiry cleanup aborted",
                    None,
                    format!(
                        "retention of {} years is out of range for {}",
                        self.retention.years, today
                    ),
                )
            }
        };

        match self.execute(pharmacy_id, cutoff).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, %cutoff, "expiry cleanup aborted");
                CleanupReport::failure("Expiry cleanup aborted", Some(cutoff), err.to_string())
            }
        }
    }

    /// Reports what a run would purge, without mutating anything.
    #[instrument(skip_all, fields(?pharmacy_id))]
    pub async fn preview(&self, pharmacy_id: Option<Uuid>) -> Result<CleanupPreview, ServiceError> {
        let today = Utc::now().date_naive();
        let cutoff = cutoff_date(today, self.retention.years).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "retention of {} years is out of range for {}",
                self.retention.years, today
            ))
        })?;

        let expired = self.expired_lots(pharmacy_id, cutoff).await?;
        let estimated = self.estimate(&expired).await?;
        let batches = expired
            .iter()
            .map(|lot| ExpiredBatch {
                item_id: lot.item.id,
                purchase_id: lot.item.purchase_id,
                medicine_id: lot.item.medicine_id,
                medicine_name: lot.medicine_name.clone(),
                batch_number: lot.item.batch_number.clone(),
                expiry_date: lot.item.expiry_date,
                quantity: lot.item.quantity,
            })
            .collect();
        Ok(CleanupPreview {
            cutoff_date: cutoff,
            batches,
            estimated,
        })
    }

    async fn execute(
        &self,
        pharmacy_id: Option<Uuid>,
        cutoff: NaiveDate,
    ) -> Result<CleanupReport, ServiceError> {
        let expired = self.expired_lots(pharmacy_id, cutoff).await?;

        if expired.is_empty() {
            self.stamp_last_cleanup(pharmacy_id).await;
            return Ok(CleanupReport {
                success: true,
                message: "No expired batches beyond the retention window".to_string(),
                cutoff_date: Some(cutoff),
                batches_processed: 0,
                stats: LotPurgeStats::default(),
                error: None,
            });
        }

        let mut stats = LotPurgeStats::default();
        let mut batches_processed = 0u64;
        for lot in &expired {
            let outcome = self.deletion.purge_item(&lot.item).await?;
            stats.merge(&outcome.stats);
            batches_processed += 1;
            info!(
                medicine = %lot.medicine_name,
                batch = %lot.item.batch_number,
                expiry = %lot.item.expiry_date,
                "purged expired batch"
            );
        }

        self.stamp_last_cleanup(pharmacy_id).await;
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ExpiryCleanupCompleted {
                    pharmacy_id,
                    batches_processed,
                })
                .await;
        }

        Ok(CleanupReport {
            success: true,
            message: format!("Purged {} expired batches", batches_processed),
            cutoff_date: Some(cutoff),
            batches_processed,
            stats,
            error: None,
        })
    }

    /// Enumerates expired purchase lines in expiry order, annotated with
    /// their medicine names for reporting.
    async fn expired_lots(
        &self,
        pharmacy_id: Option<Uuid>,
        cutoff: NaiveDate,
    ) -> Result<Vec<ExpiredLot>, ServiceError> {
        let store = self.store.as_ref();
        let mut filter = Filter::new().lt(purchase_item::col::EXPIRY_DATE, cutoff);
        if let Some(pharmacy_id) = pharmacy_id {
            filter = filter.eq(purchase_item::col::PHARMACY_ID, pharmacy_id);
        }
        let rows = store
            .select(
                purchase_item::TABLE,
                &Query::filtered(filter).order_by_asc(purchase_item::col::EXPIRY_DATE),
            )
            .await?;

        let mut expired = Vec::with_capacity(rows.len());
        for row in rows {
            let item: PurchaseItem = entities::from_row(purchase_item::TABLE, row)?;
            let medicine_name = self.medicine_name(item.medicine_id).await;
            expired.push(ExpiredLot {
                item,
                medicine_name,
            });
        }
        Ok(expired)
    }

    /// Annotation only; an unreadable catalog never blocks a purge.
    async fn medicine_name(&self, medicine_id: Uuid) -> String {
        let query =
            Query::filtered(Filter::new().eq(medicine::col::ID, medicine_id)).limit(1);
        match self.store.select(medicine::TABLE, &query).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| {
                    row.get(medicine::col::NAME)
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "(unknown medicine)".to_string()),
            Err(err) => {
                warn!(%medicine_id, error = %err, "could not resolve medicine name");
                "(unknown medicine)".to_string()
            }
        }
    }

    /// Estimates per-table deletions for a dry run. Missing dependent tables
    /// count as zero, like in a real run.
    async fn estimate(&self, expired: &[ExpiredLot]) -> Result<LotPurgeStats, ServiceError> {
        let store = self.store.as_ref();
        let mut estimated = LotPurgeStats {
            purchase_items: expired.len() as u64,
            ..LotPurgeStats::default()
        };

        for lot in expired {
            let key = lot.item.lot_key();
            estimated.current_inventory +=
                self.count_rows(inventory_record::TABLE, &key.filter()).await?;
            estimated.stock_transactions +=
                self.count_rows(stock_transaction::TABLE, &key.filter()).await?;
        }

        // A purchase goes away when every one of its lines is in the purge set.
        let expired_ids: HashSet<Uuid> = expired.iter().map(|lot| lot.item.id).collect();
        let purchase_ids: HashSet<Uuid> =
            expired.iter().map(|lot| lot.item.purchase_id).collect();
        for purchase_id in purchase_ids {
            let rows = store
                .select(
                    purchase_item::TABLE,
                    &Query::filtered(
                        Filter::new().eq(purchase_item::col::PURCHASE_ID, purchase_id),
                    ),
                )
                .await?;
            let survivors = rows
                .into_iter()
                .filter_map(|row| {
                    row.get(purchase_item::col::ID)
                        .and_then(|v| v.as_str())
                        .and_then(|s| Uuid::parse_str(s).ok())
                })
                .filter(|id| !expired_ids.contains(id))
                .count();
            if survivors == 0 {
                estimated.purchases += 1;
            }
        }
        Ok(estimated)
    }

    async fn count_rows(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        match self.store.select(table, &Query::filtered(filter.clone())).await {
            Ok(rows) => Ok(rows.len() as u64),
            Err(StoreError::TableNotFound(_)) => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Stamps the last-cleanup timestamp for the scope, or for every
    /// pharmacy when the run was unscoped. Best-effort bookkeeping.
    async fn stamp_last_cleanup(&self, pharmacy_id: Option<Uuid>) {
        let mut filter = Filter::new();
        if let Some(pharmacy_id) = pharmacy_id {
            filter = filter.eq(pharmacy::col::ID, pharmacy_id);
        }
        let fields = RowBuilder::new()
            .set(pharmacy::col::LAST_EXPIRY_CLEANUP_AT, Utc::now())
            .build();
        match zero_when_missing(self.store.update(pharmacy::TABLE, &filter, fields).await) {
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to stamp last cleanup timestamp"),
        }
    }
}

/// January 1 of `(year(today) − retention_years)`; lots expiring strictly
/// before this date are eligible for purging.
pub fn cutoff_date(today: NaiveDate, retention_years: u32) -> Option<NaiveDate> {
    let year = today.year().checked_sub(i32::try_from(retention_years).ok()?)?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}
