use crate::alarms::{self as alarm_rules, InputError};
use crate::occurrences::{Channel, OccurrenceKey};
use crate::ports::TimeProvider;
use crate::state;
use crate::store::{StoreError, UpdateOutcome};
use crate::types::alarm::{Alarm, AlarmPatch, NewAlarm};

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::{ErrorResponse, HandlerError, SuccessResponse, json_body};

pub(crate) async fn list_alarms(State(state): State<state::AppState>) -> Json<Vec<Alarm>> {
    Json(state.alarms.list())
}

pub(crate) async fn create_alarm(
    State(state): State<state::AppState>,
    body: Result<Json<NewAlarm>, JsonRejection>,
) -> Result<Json<Alarm>, HandlerError> {
    let request = json_body(body)?;
    crate::store::validate_new(&request).map_err(bad_request)?;
    let now_millis = unix_millis(&state);
    let alarm = state
        .alarms
        .create(request, now_millis)
        .map_err(store_error)?;
    tracing::info!(alarm_id = %alarm.id, time = %alarm.time, "created alarm");
    Ok(Json(alarm))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateAlarmRequest {
    pub(crate) id: Option<String>,
    #[serde(flatten)]
    pub(crate) patch: AlarmPatch,
    pub(crate) expected_version: Option<u64>,
}

pub(crate) async fn update_alarm(
    State(state): State<state::AppState>,
    body: Result<Json<UpdateAlarmRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, HandlerError> {
    let request = json_body(body)?;
    crate::store::validate_patch(&request.patch).map_err(bad_request)?;
    let Some(id) = request.id else {
        return Ok(Json(SuccessResponse::ok()));
    };
    match state
        .alarms
        .update(&id, request.patch, request.expected_version)
        .map_err(store_error)?
    {
        UpdateOutcome::Updated(alarm) => {
            tracing::debug!(alarm_id = %alarm.id, version = alarm.version, "updated alarm");
        }
        UpdateOutcome::Missing => {
            tracing::debug!(alarm_id = %id, "update for unknown alarm ignored");
        }
    }
    Ok(Json(SuccessResponse::ok()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteQuery {
    pub(crate) id: Option<String>,
}

pub(crate) async fn delete_alarm(
    State(state): State<state::AppState>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<SuccessResponse>, HandlerError> {
    if let Some(id) = query.id {
        let removed = state.alarms.delete(&id).map_err(store_error)?;
        tracing::debug!(alarm_id = %id, removed, "delete alarm");
    }
    Ok(Json(SuccessResponse::ok()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SnoozeRequest {
    pub(crate) alarm_id: String,
}

pub(crate) async fn snooze_alarm(
    State(state): State<state::AppState>,
    body: Result<Json<SnoozeRequest>, JsonRejection>,
) -> Result<Json<Alarm>, HandlerError> {
    let request = json_body(body)?;
    let Some(alarm) = state.alarms.get(&request.alarm_id) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("alarm not found")),
        ));
    };
    let snoozed = alarm_rules::snooze_alarm(&alarm, state.clock.now());
    let now_millis = unix_millis(&state);
    let created = state
        .alarms
        .create(snoozed, now_millis)
        .map_err(store_error)?;
    tracing::info!(alarm_id = %alarm.id, snoozed_id = %created.id, time = %created.time, "snoozed alarm");
    Ok(Json(created))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClaimRequest {
    pub(crate) alarm_id: String,
    pub(crate) minute: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimResponse {
    pub(crate) claimed: bool,
}

pub(crate) async fn claim_occurrence(
    State(state): State<state::AppState>,
    body: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<Json<ClaimResponse>, HandlerError> {
    let request = json_body(body)?;
    if request.alarm_id.trim().is_empty() || request.minute.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("alarmId and minute are required.")),
        ));
    }
    let key = OccurrenceKey::new(&request.alarm_id, request.minute, Channel::Client);
    let claimed = state.occurrences.claim(key, state.clock.now());
    Ok(Json(ClaimResponse { claimed }))
}

fn unix_millis(state: &state::AppState) -> u128 {
    let nanos = state.clock.now().unix_timestamp_nanos();
    u128::try_from(nanos / 1_000_000).unwrap_or_default()
}

fn bad_request(err: InputError) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(err.to_string())))
}

fn store_error(err: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        StoreError::Conflict { .. } => {
            (StatusCode::CONFLICT, Json(ErrorResponse::new(err.to_string())))
        }
        err => {
            tracing::error!(error = %err, "alarm store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal error")),
            )
        }
    }
}
