pub mod alarm_api;
pub mod alert;
pub mod push;
pub mod time;

pub use alarm_api::AlarmApi;
pub use alert::Alert;
pub use push::PushSender;
pub use self::time::TimeProvider;
