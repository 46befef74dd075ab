use crate::alarms::{self, Moment};
use crate::occurrences::{Channel, OccurrenceKey, OccurrenceLedger, minute_key};
use crate::ports;
use crate::store::{AlarmStore, StoreError, SubscriptionStore, UpdateOutcome};
use crate::types::alarm::Alarm;
use crate::types::push::{PushPayload, Subscription};

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const TICK: Duration = Duration::from_secs(1);
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of seconds after each minute boundary during which the poller
/// evaluates alarms. A wider window tolerates timer jitter; the occurrence
/// ledger keeps it from sending twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindow(u8);

impl MatchWindow {
    pub const DEFAULT: MatchWindow = MatchWindow(2);

    pub fn new(seconds: u8) -> Result<Self, String> {
        if (1..=59).contains(&seconds) {
            Ok(Self(seconds))
        } else {
            Err(format!(
                "match window must be between 1 and 59 seconds, got {seconds}"
            ))
        }
    }

    pub fn seconds(self) -> u8 {
        self.0
    }

    pub fn contains(self, second: u8) -> bool {
        second < self.0
    }
}

impl Default for MatchWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Start-once handle for the background poller. There is no stop: once
/// started the poller lives as long as the process.
#[derive(Clone, Default)]
pub struct PollerHandle {
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PollerHandle {
    /// Runs `spawn` unless a poller is already running. Returns whether a new
    /// poller was started.
    pub(crate) fn start_with<F>(&self, spawn: F) -> bool
    where
        F: FnOnce() -> Option<JoinHandle<()>>,
    {
        let mut guard = self.handle.lock().expect("poller handle lock");
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        match spawn() {
            Some(handle) => {
                *guard = Some(handle);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .expect("poller handle lock")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[derive(Clone)]
pub(crate) struct AlarmPoller<T, S> {
    time: T,
    sender: S,
    alarms: AlarmStore,
    subscriptions: SubscriptionStore,
    ledger: Arc<OccurrenceLedger>,
    window: MatchWindow,
}

impl<T, S> AlarmPoller<T, S>
where
    T: ports::TimeProvider,
    S: ports::PushSender,
{
    pub(crate) fn new(
        time: T,
        sender: S,
        alarms: AlarmStore,
        subscriptions: SubscriptionStore,
        ledger: Arc<OccurrenceLedger>,
        window: MatchWindow,
    ) -> Self {
        Self {
            time,
            sender,
            alarms,
            subscriptions,
            ledger,
            window,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                match_window_secs = self.window.seconds(),
                "starting alarm poller"
            );
            let mut interval = tokio::time::interval(TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                // Deliveries are detached; dropping the outcome does not cancel them.
                let outcome = self.tick().await;
                if !outcome.fired.is_empty() {
                    tracing::debug!(
                        fired = ?outcome.fired,
                        deliveries = outcome.deliveries.len(),
                        "poll tick done"
                    );
                }
            }
        })
    }

    /// One poll iteration. Matching, claiming and deactivation happen inline;
    /// notification delivery runs on detached tasks so a slow endpoint cannot
    /// hold up the next tick.
    pub(crate) async fn tick(&self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let now = self.time.now();
        let moment = Moment::from_datetime(now);
        if !self.window.contains(moment.second) {
            return outcome;
        }

        let due: Vec<_> = self
            .alarms
            .list()
            .into_iter()
            .filter(|alarm| alarms::fires(alarm, &moment))
            .collect();
        if due.is_empty() {
            return outcome;
        }

        let subscriptions = self.subscriptions.list();
        let minute = minute_key(now);

        for alarm in due {
            let key = OccurrenceKey::new(&alarm.id, minute.clone(), Channel::Push);
            if !self.ledger.claim(key, now) {
                continue;
            }
            tracing::info!(
                alarm_id = %alarm.id,
                label = %alarm.label,
                subscriptions = subscriptions.len(),
                "alarm triggered"
            );

            if !subscriptions.is_empty() {
                match serde_json::to_string(&PushPayload::for_alarm(&alarm)) {
                    Ok(payload) => outcome.deliveries.push(tokio::spawn(deliver(
                        self.sender.clone(),
                        subscriptions.clone(),
                        alarm.id.clone(),
                        payload,
                    ))),
                    Err(err) => {
                        tracing::error!(alarm_id = %alarm.id, error = %err, "failed to encode push payload");
                    }
                }
            }

            if alarm.is_one_time() {
                self.deactivate_matched(&alarm);
            }

            outcome.fired.push(alarm.id);
        }

        outcome
    }

    /// Deactivates `alarm` only if it is still at the version seen when it
    /// matched.
    fn deactivate_matched(&self, alarm: &Alarm) {
        match self.alarms.deactivate(&alarm.id, alarm.version) {
            Ok(UpdateOutcome::Updated(_)) => {
                tracing::debug!(alarm_id = %alarm.id, "deactivated one-time alarm");
            }
            Ok(UpdateOutcome::Missing) => {
                tracing::debug!(alarm_id = %alarm.id, "alarm deleted before deactivation");
            }
            Err(StoreError::Conflict { .. }) => {
                tracing::info!(
                    alarm_id = %alarm.id,
                    "alarm edited since match, keeping the edit"
                );
            }
            Err(err) => {
                tracing::error!(alarm_id = %alarm.id, error = %err, "failed to deactivate alarm");
            }
        }
    }
}

async fn deliver<S: ports::PushSender>(
    sender: S,
    subscriptions: Vec<Subscription>,
    alarm_id: String,
    payload: String,
) {
    for subscription in &subscriptions {
        match tokio::time::timeout(DELIVERY_TIMEOUT, sender.send(subscription, &payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(
                    alarm_id = %alarm_id,
                    endpoint = %subscription.endpoint,
                    error = %err,
                    "push delivery error"
                );
            }
            Err(_) => {
                tracing::warn!(
                    alarm_id = %alarm_id,
                    endpoint = %subscription.endpoint,
                    timeout_secs = DELIVERY_TIMEOUT.as_secs(),
                    "push delivery timed out"
                );
            }
        }
    }
}

/// Result of one poll iteration.
#[derive(Default)]
pub(crate) struct TickOutcome {
    /// Ids of the alarms that fired, in store order.
    pub(crate) fired: Vec<String>,
    deliveries: Vec<JoinHandle<()>>,
}

impl TickOutcome {
    /// Waits for this tick's deliveries to finish.
    #[cfg(test)]
    pub(crate) async fn delivered(self) -> Vec<String> {
        for delivery in self.deliveries {
            let _ = delivery.await;
        }
        self.fired
    }
}
