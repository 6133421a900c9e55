//! RxStock API Library
//!
//! Back-office engine for pharmacy purchase management. The backing store
//! offers no cascading deletes, no trigger-driven foreign-key updates, and no
//! multi-statement transactions, so every cross-table invariant between
//! purchases, purchase line items, the current-stock snapshot, and the stock
//! ledger is maintained here as an ordered sequence of filtered store
//! commands.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::services::factory::AppServices;
use crate::store::StoreClient;

/// Shared application state wired once at process start.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreClient>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        store: Arc<dyn StoreClient>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services =
            services::factory::build_services(store.clone(), &config, Some(event_sender.clone()));
        Self {
            store,
            config,
            event_sender,
            services,
        }
    }
}
