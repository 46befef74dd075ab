use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub time: String,
    pub label: String,
    #[serde(default)]
    pub days: Vec<u8>,
    pub is_active: bool,
    #[serde(default)]
    pub version: u64,
}

impl Alarm {
    /// An alarm without repeat days rings once and is then deactivated.
    pub fn is_one_time(&self) -> bool {
        self.days.is_empty()
    }
}

/// Fields accepted when creating an alarm. Anything omitted falls back to the
/// store defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlarm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl AlarmPatch {
    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Default::default()
        }
    }

    pub(crate) fn apply(self, alarm: &mut Alarm) {
        if let Some(time) = self.time {
            alarm.time = time;
        }
        if let Some(label) = self.label {
            alarm.label = label;
        }
        if let Some(days) = self.days {
            alarm.days = days;
        }
        if let Some(is_active) = self.is_active {
            alarm.is_active = is_active;
        }
    }
}
