use time::OffsetDateTime;

pub trait TimeProvider: Clone + Send + Sync + 'static {
    /// Current wall-clock time in the configured local offset.
    fn now(&self) -> OffsetDateTime;
}
