use crate::adapters::LocalClock;
use crate::config::AppConfig;
use crate::occurrences::OccurrenceLedger;
use crate::push::{self, PollerHandle};
use crate::store::{AlarmStore, SubscriptionStore};
use crate::types::push::VapidConfig;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub clock: LocalClock,
    pub alarms: AlarmStore,
    pub subscriptions: SubscriptionStore,
    pub occurrences: Arc<OccurrenceLedger>,
    /// Resolved once per process; `None` keeps push delivery disabled.
    pub vapid: Option<VapidConfig>,
    pub poller: PollerHandle,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let vapid = push::resolve_vapid_config(&config);
        Self {
            clock: LocalClock::new(config.utc_offset),
            alarms: AlarmStore::open(&config.data_dir),
            subscriptions: SubscriptionStore::open(&config.data_dir),
            occurrences: Arc::new(OccurrenceLedger::new()),
            vapid,
            poller: PollerHandle::default(),
            config,
        }
    }
}
