use crate::push::MatchWindow;

use std::path::PathBuf;
use time::UtcOffset;

pub const DEFAULT_VAPID_SUBJECT: &str = "mailto:admin@example.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: String,
    pub match_window: MatchWindow,
    /// Offset used to interpret alarm times as local wall-clock time.
    pub utc_offset: UtcOffset,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: DEFAULT_VAPID_SUBJECT.to_string(),
            match_window: MatchWindow::DEFAULT,
            utc_offset: UtcOffset::UTC,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub server: String,
    pub utc_offset: UtcOffset,
}
