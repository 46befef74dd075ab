use crate::types::push::Subscription;

use super::{JsonFile, SUBSCRIPTIONS_FILE, StoreError};

use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct SubscriptionStore {
    file: JsonFile<Vec<Subscription>>,
    lock: Arc<Mutex<()>>,
}

impl SubscriptionStore {
    pub fn open(data_dir: &Path) -> Self {
        Self {
            file: JsonFile::new(data_dir.join(SUBSCRIPTIONS_FILE)),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn list(&self) -> Vec<Subscription> {
        let _guard = self.lock.lock().expect("subscription store lock");
        self.file.load()
    }

    /// Returns `false` when a subscription with the same endpoint is already
    /// stored; the existing entry is kept as is.
    pub fn add(&self, subscription: Subscription) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().expect("subscription store lock");
        let mut subscriptions = self.file.load();
        if subscriptions
            .iter()
            .any(|existing| existing.endpoint == subscription.endpoint)
        {
            return Ok(false);
        }
        subscriptions.push(subscription);
        self.file.save(&subscriptions)?;
        Ok(true)
    }
}
