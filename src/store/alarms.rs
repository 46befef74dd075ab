use crate::alarms::{self, AlarmTime, InputError};
use crate::types::alarm::{Alarm, AlarmPatch, NewAlarm};

use super::{ALARMS_FILE, JsonFile, StoreError};

use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(Alarm),
    Missing,
}

#[derive(Debug, Clone)]
pub struct AlarmStore {
    file: JsonFile<Vec<Alarm>>,
    lock: Arc<Mutex<()>>,
}

impl AlarmStore {
    pub fn open(data_dir: &Path) -> Self {
        Self {
            file: JsonFile::new(data_dir.join(ALARMS_FILE)),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn list(&self) -> Vec<Alarm> {
        let _guard = self.lock.lock().expect("alarm store lock");
        self.file.load()
    }

    pub fn get(&self, id: &str) -> Option<Alarm> {
        self.list().into_iter().find(|alarm| alarm.id == id)
    }

    /// Validates the request, fills in defaults and assigns a fresh id.
    /// `now_millis` seeds the id so that ids follow creation order.
    pub fn create(&self, request: NewAlarm, now_millis: u128) -> Result<Alarm, StoreError> {
        let _guard = self.lock.lock().expect("alarm store lock");
        let mut alarms = self.file.load();
        let alarm = Alarm {
            id: next_id(&alarms, now_millis),
            time: request
                .time
                .filter(|time| !time.is_empty())
                .unwrap_or_else(|| alarms::DEFAULT_TIME.to_string()),
            label: request
                .label
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| alarms::DEFAULT_LABEL.to_string()),
            days: request.days.unwrap_or_default(),
            is_active: request.is_active.unwrap_or(true),
            version: 0,
        };
        alarms.push(alarm.clone());
        self.file.save(&alarms)?;
        Ok(alarm)
    }

    /// Merges `patch` into the alarm with `id`. When `expected_version` is set
    /// and differs from the stored version nothing is written.
    pub fn update(
        &self,
        id: &str,
        patch: AlarmPatch,
        expected_version: Option<u64>,
    ) -> Result<UpdateOutcome, StoreError> {
        let _guard = self.lock.lock().expect("alarm store lock");
        let mut alarms = self.file.load();
        let Some(alarm) = alarms.iter_mut().find(|alarm| alarm.id == id) else {
            return Ok(UpdateOutcome::Missing);
        };
        if let Some(expected) = expected_version
            && expected != alarm.version
        {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected,
                actual: alarm.version,
            });
        }
        patch.apply(alarm);
        alarm.version += 1;
        let updated = alarm.clone();
        self.file.save(&alarms)?;
        Ok(UpdateOutcome::Updated(updated))
    }

    pub fn deactivate(&self, id: &str, expected_version: u64) -> Result<UpdateOutcome, StoreError> {
        self.update(id, AlarmPatch::deactivate(), Some(expected_version))
    }

    /// Returns whether anything was removed. Unknown ids leave the file untouched.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().expect("alarm store lock");
        let mut alarms = self.file.load();
        let before = alarms.len();
        alarms.retain(|alarm| alarm.id != id);
        if alarms.len() == before {
            return Ok(false);
        }
        self.file.save(&alarms)?;
        Ok(true)
    }
}

fn next_id(alarms: &[Alarm], now_millis: u128) -> String {
    let newest = alarms
        .iter()
        .filter_map(|alarm| alarm.id.parse::<u128>().ok())
        .max();
    let id = match newest {
        Some(newest) if newest >= now_millis => newest + 1,
        _ => now_millis,
    };
    id.to_string()
}

/// An empty `time` is allowed here because `create` replaces it with the
/// default.
pub(crate) fn validate_new(request: &NewAlarm) -> Result<(), InputError> {
    let time = request.time.as_deref().filter(|time| !time.is_empty());
    validate_fields(time, request.days.as_deref())
}

/// Patches are written as given, so every present field must be valid.
pub(crate) fn validate_patch(patch: &AlarmPatch) -> Result<(), InputError> {
    validate_fields(patch.time.as_deref(), patch.days.as_deref())
}

fn validate_fields(time: Option<&str>, days: Option<&[u8]>) -> Result<(), InputError> {
    if let Some(time) = time {
        AlarmTime::parse(time)?;
    }
    if let Some(days) = days {
        alarms::validate_days(days)?;
    }
    Ok(())
}
