//! Process-wide record of alarm occurrences that have already been delivered.
//!
//! Both delivery channels consult the ledger before acting, so each channel
//! rings an occurrence at most once even when its own timer observes the same
//! minute several times.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use std::collections::HashMap;
use std::sync::Mutex;

const RETENTION: time::Duration = time::Duration::minutes(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Push,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OccurrenceKey {
    pub alarm_id: String,
    /// Local calendar minute, `YYYY-MM-DDTHH:MM`.
    pub minute: String,
    pub channel: Channel,
}

impl OccurrenceKey {
    pub fn new(alarm_id: &str, minute: String, channel: Channel) -> Self {
        Self {
            alarm_id: alarm_id.to_string(),
            minute,
            channel,
        }
    }
}

pub fn minute_key(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    at.format(&format)
        .unwrap_or_else(|_| format!("{}T{:02}:{:02}", at.date(), at.hour(), at.minute()))
}

#[derive(Debug, Default)]
pub struct OccurrenceLedger {
    claimed: Mutex<HashMap<OccurrenceKey, OffsetDateTime>>,
}

impl OccurrenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the first claim of `key`.
    pub fn claim(&self, key: OccurrenceKey, now: OffsetDateTime) -> bool {
        let mut claimed = self.claimed.lock().expect("occurrence ledger lock");
        claimed.retain(|_, claimed_at| now - *claimed_at < RETENTION);
        if claimed.contains_key(&key) {
            return false;
        }
        claimed.insert(key, now);
        true
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().expect("occurrence ledger lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
