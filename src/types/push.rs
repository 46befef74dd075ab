use serde::{Deserialize, Serialize};

use super::alarm::Alarm;

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}

/// Mirrors the browser's `PushSubscription.toJSON()` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<u64>,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub alarm_id: String,
}

impl PushPayload {
    pub fn for_alarm(alarm: &Alarm) -> Self {
        Self {
            title: "Alarm Triggered!".to_string(),
            body: format!("It's time for: {}", alarm.label),
            icon: "/icon.png".to_string(),
            alarm_id: alarm.id.clone(),
        }
    }
}
