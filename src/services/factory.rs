use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    expiry_cleanup::ExpiryCleanupService, item_deletion::ItemDeletionService,
    purchase_items::PurchaseItemService,
};
use crate::store::StoreClient;

/// Service container holding all service instances
#[derive(Clone)]
pub struct AppServices {
    pub purchase_items: PurchaseItemService,
    pub item_deletion: ItemDeletionService,
    pub expiry_cleanup: ExpiryCleanupService,
}

/// Creates all services with shared dependencies.
pub fn build_services(
    store: Arc<dyn StoreClient>,
    config: &AppConfig,
    event_sender: Option<EventSender>,
) -> AppServices {
    let purchase_items = PurchaseItemService::new(store.clone(), event_sender.clone());
    let item_deletion = ItemDeletionService::new(store.clone(), event_sender.clone());
    let expiry_cleanup = ExpiryCleanupService::new(
        store,
        item_deletion.clone(),
        config.retention.clone(),
        event_sender,
    );
    AppServices {
        purchase_items,
        item_deletion,
        expiry_cleanup,
    }
}
