use crate::types::alarm::{Alarm, AlarmPatch, NewAlarm};

/// Remote view of the alarm store as seen by a foreground client.
pub trait AlarmApi: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a, T>: Future<Output = Result<T, Self::Error>> + Send + 'a
    where
        Self: 'a,
        T: 'a;

    fn list(&self) -> Self::Fut<'_, Vec<Alarm>>;
    fn create<'a>(&'a self, alarm: &'a NewAlarm) -> Self::Fut<'a, Alarm>;
    fn update<'a>(
        &'a self,
        id: &'a str,
        patch: &'a AlarmPatch,
        expected_version: Option<u64>,
    ) -> Self::Fut<'a, ()>;
    /// Claims the client-channel occurrence of `alarm_id` for `minute`.
    /// Returns `false` when another client already claimed it.
    fn claim<'a>(&'a self, alarm_id: &'a str, minute: &'a str) -> Self::Fut<'a, bool>;
}
