use crate::types::alarm::Alarm;

/// Foreground presentation of a ringing alarm.
pub trait Alert: Send + 'static {
    /// Shows the prompt and starts the repeating tone. The tone keeps going
    /// until [`Alert::stop`] is called.
    fn start(&mut self, alarm: &Alarm);
    fn stop(&mut self);
}
