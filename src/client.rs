//! Foreground alarm loop for the `watch` command.
//!
//! The loop keeps a snapshot of the server's alarms, refreshed every two
//! seconds, and checks it once per second. Only the tick that lands on second
//! zero can ring an alarm, and only one alarm is presented at a time.

mod http;
mod terminal;

pub use http::{ClientError, HttpAlarmApi};
pub use terminal::{TerminalAlert, spawn_stdin_commands};

use crate::alarms::{self, Moment};
use crate::occurrences::minute_key;
use crate::ports::{AlarmApi, Alert, TimeProvider};
use crate::types::alarm::{Alarm, AlarmPatch};

use std::time::Duration;
use tokio::sync::mpsc;

const TICK: Duration = Duration::from_secs(1);
const REFRESH: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Dismiss,
    Snooze,
    Quit,
}

pub struct ClientAlarmLoop<T, A, L> {
    time: T,
    api: A,
    alert: L,
    snapshot: Vec<Alarm>,
    presented: Option<Alarm>,
}

impl<T, A, L> ClientAlarmLoop<T, A, L>
where
    T: TimeProvider,
    A: AlarmApi,
    L: Alert,
{
    pub fn new(time: T, api: A, alert: L) -> Self {
        Self {
            time,
            api,
            alert,
            snapshot: Vec::new(),
            presented: None,
        }
    }

    pub fn presented(&self) -> Option<&Alarm> {
        self.presented.as_ref()
    }

    pub fn snapshot(&self) -> &[Alarm] {
        &self.snapshot
    }

    /// Replaces the snapshot. A failed fetch keeps the previous one.
    pub async fn refresh(&mut self) {
        match self.api.list().await {
            Ok(alarms) => self.snapshot = alarms,
            Err(err) => tracing::warn!(error = %err, "failed to fetch alarms"),
        }
    }

    pub async fn tick(&mut self) {
        let now = self.time.now();
        let moment = Moment::from_datetime(now);
        if moment.second != 0 || self.presented.is_some() {
            return;
        }
        let candidates: Vec<Alarm> = self
            .snapshot
            .iter()
            .filter(|alarm| alarms::fires(alarm, &moment))
            .cloned()
            .collect();
        let minute = minute_key(now);
        let mut matched = None;
        for candidate in candidates {
            match self.api.claim(&candidate.id, &minute).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(alarm_id = %candidate.id, "alarm already rung by another client");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(alarm_id = %candidate.id, error = %err, "occurrence claim failed, ringing anyway");
                }
            }
            matched = Some(candidate);
            break;
        }
        let Some(matched) = matched else {
            return;
        };

        tracing::info!(alarm_id = %matched.id, label = %matched.label, "alarm ringing");
        self.alert.start(&matched);

        if matched.is_one_time() {
            if let Some(local) = self
                .snapshot
                .iter_mut()
                .find(|alarm| alarm.id == matched.id)
            {
                local.is_active = false;
            }
            if let Err(err) = self
                .api
                .update(&matched.id, &AlarmPatch::deactivate(), Some(matched.version))
                .await
            {
                tracing::warn!(alarm_id = %matched.id, error = %err, "failed to deactivate one-time alarm");
            }
        }

        self.presented = Some(matched);
    }

    pub fn dismiss(&mut self) {
        self.alert.stop();
        self.presented = None;
    }

    pub async fn snooze(&mut self) {
        self.alert.stop();
        let Some(alarm) = self.presented.take() else {
            return;
        };
        let now = self.time.now();
        let snoozed = alarms::snooze_alarm(&alarm, now);
        match self.api.create(&snoozed).await {
            Ok(created) => {
                if let Some(next) = alarms::next_occurrence(&created, now) {
                    println!(
                        "{} set for {} from now",
                        created.label,
                        alarms::describe_until(next - now)
                    );
                }
            }
            Err(err) => tracing::warn!(alarm_id = %alarm.id, error = %err, "failed to snooze alarm"),
        }
        self.refresh().await;
    }

    /// Earliest upcoming active alarm and when it rings.
    pub fn next_alarm(&self) -> Option<(&Alarm, time::OffsetDateTime)> {
        let now = self.time.now();
        self.snapshot
            .iter()
            .filter(|alarm| alarm.is_active)
            .filter_map(|alarm| alarms::next_occurrence(alarm, now).map(|at| (alarm, at)))
            .min_by_key(|(_, at)| *at)
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<UserCommand>) {
        self.refresh().await;
        if let Some((alarm, at)) = self.next_alarm() {
            println!(
                "Next alarm: {} at {} ({} from now)",
                alarm.label,
                alarm.time,
                alarms::describe_until(at - self.time.now())
            );
        } else {
            println!("No active alarms.");
        }

        let mut tick = tokio::time::interval(TICK);
        let mut refresh = tokio::time::interval(REFRESH);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => self.tick().await,
                _ = refresh.tick() => self.refresh().await,
                command = commands.recv() => match command {
                    Some(UserCommand::Dismiss) => self.dismiss(),
                    Some(UserCommand::Snooze) => self.snooze().await,
                    Some(UserCommand::Quit) | None => {
                        self.alert.stop();
                        break;
                    }
                },
            }
        }
    }
}
