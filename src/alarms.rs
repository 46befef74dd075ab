//! Alarm matching and the small bits of calendar arithmetic around it.
//!
//! Matching is deliberately coarse: an alarm fires when its `HH:MM` string
//! equals the current local minute. Callers decide how often, and inside which
//! seconds of the minute, they evaluate [`fires`].

use std::fmt;

use time::{Duration, OffsetDateTime, Time};

use crate::types::alarm::{Alarm, NewAlarm};

pub const DEFAULT_TIME: &str = "07:00";
pub const DEFAULT_LABEL: &str = "Alarm";
pub const SNOOZE_MINUTES: i64 = 10;

/// A wall-clock moment reduced to what the matcher cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 = Sunday.
    pub weekday: u8,
}

impl Moment {
    pub fn from_datetime(at: OffsetDateTime) -> Self {
        Self {
            hour: at.hour(),
            minute: at.minute(),
            second: at.second(),
            weekday: at.weekday().number_days_from_sunday(),
        }
    }

    pub fn hhmm(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

pub fn fires(alarm: &Alarm, moment: &Moment) -> bool {
    alarm.is_active
        && alarm.time == moment.hhmm()
        && (alarm.days.is_empty() || alarm.days.contains(&moment.weekday))
}

/// Validated `HH:MM` alarm time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTime {
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid alarm time '{0}'; expected HH:MM (24h)")]
    InvalidTime(String),
    #[error("invalid weekday {0}; expected 0 (Sunday) through 6")]
    InvalidWeekday(u8),
}

impl AlarmTime {
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let invalid = || InputError::InvalidTime(raw.to_string());
        let (hour, minute) = raw.split_once(':').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(hour) || !two_digits(minute) {
            return Err(invalid());
        }
        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }

    pub fn from_datetime(at: OffsetDateTime) -> Self {
        Self {
            hour: at.hour(),
            minute: at.minute(),
        }
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

pub fn validate_days(days: &[u8]) -> Result<(), InputError> {
    match days.iter().find(|day| **day > 6) {
        Some(day) => Err(InputError::InvalidWeekday(*day)),
        None => Ok(()),
    }
}

/// One-time copy of `alarm` that rings [`SNOOZE_MINUTES`] after `now`.
pub fn snooze_alarm(alarm: &Alarm, now: OffsetDateTime) -> NewAlarm {
    let at = now + Duration::minutes(SNOOZE_MINUTES);
    NewAlarm {
        time: Some(AlarmTime::from_datetime(at).to_string()),
        label: Some(format!("Snoozed: {}", alarm.label)),
        days: Some(Vec::new()),
        is_active: Some(true),
    }
}

/// Next local moment at which `alarm` would ring, ignoring `is_active`.
///
/// Returns `None` when the stored time cannot be parsed or no listed weekday
/// is valid.
pub fn next_occurrence(alarm: &Alarm, now: OffsetDateTime) -> Option<OffsetDateTime> {
    let time = AlarmTime::parse(&alarm.time).ok()?;
    let at = Time::from_hms(time.hour, time.minute, 0).ok()?;
    let mut target = now.replace_time(at);
    if target <= now {
        target += Duration::days(1);
    }
    if alarm.days.is_empty() {
        return Some(target);
    }
    for _ in 0..7 {
        if alarm
            .days
            .contains(&target.weekday().number_days_from_sunday())
        {
            return Some(target);
        }
        target += Duration::days(1);
    }
    None
}

pub fn describe_until(remaining: Duration) -> String {
    let total_minutes = (remaining.whole_seconds() as f64 / 60.0).round() as i64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours <= 0 && minutes <= 0 {
        return "less than a minute".to_string();
    }

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours} hour{}", if hours > 1 { "s" } else { "" }));
    }
    if minutes > 0 {
        parts.push(format!(
            "{minutes} minute{}",
            if minutes > 1 { "s" } else { "" }
        ));
    }
    parts.join(" and ")
}
