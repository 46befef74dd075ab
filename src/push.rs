use crate::adapters::WebPushSender;
use crate::state::AppState;

mod poller;
pub(crate) mod vapid;

pub use poller::{MatchWindow, PollerHandle};
pub use vapid::{VapidCredentials, generate_vapid_credentials};

pub(crate) use poller::AlarmPoller;
pub(crate) use vapid::resolve_vapid_config;

/// Starts the background poller unless it is already running. Safe to call on
/// every request that should keep push delivery alive.
pub(crate) fn ensure_poller_started(state: &AppState) -> bool {
    state.poller.start_with(|| {
        let vapid = state.vapid.clone()?;
        let sender = match WebPushSender::new(vapid) {
            Ok(sender) => sender,
            Err(err) => {
                tracing::error!(error = %err, "push notifications disabled: failed to init web-push");
                return None;
            }
        };
        let poller = AlarmPoller::new(
            state.clock,
            sender,
            state.alarms.clone(),
            state.subscriptions.clone(),
            std::sync::Arc::clone(&state.occurrences),
            state.config.match_window,
        );
        Some(poller.spawn())
    })
}
