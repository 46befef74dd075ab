use crate::ports::TimeProvider;
use crate::push as push_service;
use crate::state;
use crate::types::push::Subscription;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use super::{ErrorResponse, HandlerError, SuccessResponse, json_body};

#[derive(Serialize, Deserialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

/// Hands out the VAPID public key. The first call also starts the alarm
/// poller, which then runs for the rest of the process lifetime.
pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> Result<Json<PublicKeyResponse>, HandlerError> {
    let Some(vapid) = state.vapid.as_ref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Push notifications are not configured.")),
        ));
    };

    if push_service::ensure_poller_started(&state) {
        tracing::info!("alarm poller started");
    }

    Ok(Json(PublicKeyResponse {
        public_key: vapid.public_key.clone(),
    }))
}

pub(crate) async fn push_subscribe(
    State(state): State<state::AppState>,
    body: Result<Json<Subscription>, JsonRejection>,
) -> Result<Json<SuccessResponse>, HandlerError> {
    let subscription = json_body(body)?;
    if subscription.endpoint.trim().is_empty()
        || subscription.keys.p256dh.trim().is_empty()
        || subscription.keys.auth.trim().is_empty()
    {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("endpoint, p256dh, and auth are required.")),
        ));
    }

    let endpoint = subscription.endpoint.clone();
    match state.subscriptions.add(subscription) {
        Ok(added) => {
            tracing::info!(endpoint = %endpoint, added, "push subscription received");
            Ok(Json(SuccessResponse::ok()))
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to store push subscription");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal error")),
            ))
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PollerDebugResponse {
    pub(crate) running: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) server_time: OffsetDateTime,
    pub(crate) match_window_secs: u8,
    pub(crate) subscriptions: usize,
    pub(crate) claimed_occurrences: usize,
}

pub(crate) async fn poller_debug(State(state): State<state::AppState>) -> Json<PollerDebugResponse> {
    Json(PollerDebugResponse {
        running: state.poller.is_running(),
        server_time: state.clock.now(),
        match_window_secs: state.config.match_window.seconds(),
        subscriptions: state.subscriptions.list().len(),
        claimed_occurrences: state.occurrences.len(),
    })
}
