use crate::assets;
use crate::config;
use crate::state;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

mod alarms;
mod push;

pub(crate) type HandlerError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

impl ErrorResponse {
    pub(crate) fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SuccessResponse {
    pub(crate) success: bool,
}

impl SuccessResponse {
    pub(crate) fn ok() -> Self {
        Self { success: true }
    }
}

/// Unwraps a JSON body, turning malformed or mistyped input into a 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, HandlerError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(rejection.body_text())),
        )),
    }
}

pub fn app(config: config::AppConfig) -> Router {
    router(state::AppState::new(config))
}

pub fn router(state: state::AppState) -> Router {
    Router::new()
        .route(
            "/api/alarms",
            get(alarms::list_alarms)
                .post(alarms::create_alarm)
                .put(alarms::update_alarm)
                .delete(alarms::delete_alarm),
        )
        .route("/api/alarms/snooze", post(alarms::snooze_alarm))
        .route("/api/occurrences/claim", post(alarms::claim_occurrence))
        .route(
            "/api/push",
            get(push::push_public_key).post(push::push_subscribe),
        )
        .route("/api/debug/poller", get(push::poller_debug))
        .route("/sw.js", get(assets::service_worker))
        .route("/health", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::store::create_temp_dir;
    use crate::types::alarm::Alarm;
    use axum::body::Body;
    use axum::body::to_bytes;
    use axum::http::Request;
    use serde_json::Value as JsonValue;
    use serde_json::from_slice as json_from_slice;
    use serde_json::json;
    use tower::ServiceExt;

    use std::path::PathBuf;

    fn test_state(root: PathBuf) -> state::AppState {
        state::AppState::new(config::AppConfig {
            data_dir: root,
            ..Default::default()
        })
    }

    async fn send(
        router: Router,
        method: &str,
        uri: &str,
        body: Option<JsonValue>,
    ) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.oneshot(request).await.expect("request failed");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn app__should_return_ok_on_health_endpoint() {
        // Given
        let root = create_temp_dir("health");
        let app = app(config::AppConfig {
            data_dir: root.clone(),
            ..Default::default()
        });

        // When
        let (status, body) = send(app, "GET", "/health", None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn create_alarm__should_apply_defaults_and_list_it() {
        // Given
        let root = create_temp_dir("api-create");
        let state = test_state(root.clone());

        // When
        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/api/alarms",
            Some(json!({ "id": "client-chosen", "label": "Gym" })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK);
        let created: Alarm = json_from_slice(&body).expect("parse alarm");
        assert_ne!(created.id, "client-chosen");
        assert_eq!(created.time, "07:00");
        assert_eq!(created.label, "Gym");
        assert!(created.days.is_empty());
        assert!(created.is_active);

        let (status, body) = send(router(state), "GET", "/api/alarms", None).await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<Alarm> = json_from_slice(&body).expect("parse list");
        assert_eq!(listed, vec![created]);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn create_alarm__should_reject_invalid_time() {
        let root = create_temp_dir("api-create-invalid");
        let state = test_state(root.clone());

        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/api/alarms",
            Some(json!({ "time": "25:99" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let payload: JsonValue = json_from_slice(&body).expect("parse json");
        assert!(payload["error"].as_str().expect("error").contains("25:99"));
        assert!(state.alarms.list().is_empty());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn update_alarm__should_merge_partial_fields() {
        // Given
        let root = create_temp_dir("api-update");
        let state = test_state(root.clone());
        let alarm = state
            .alarms
            .create(Default::default(), 1)
            .expect("create alarm");

        // When
        let (status, body) = send(
            router(state.clone()),
            "PUT",
            "/api/alarms",
            Some(json!({ "id": alarm.id, "isActive": false })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK);
        let payload: JsonValue = json_from_slice(&body).expect("parse json");
        assert_eq!(payload["success"], true);
        let stored = state.alarms.get(&alarm.id).expect("alarm");
        assert!(!stored.is_active);
        assert_eq!(stored.label, "Alarm");
        assert_eq!(stored.version, 1);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn update_alarm__should_reject_empty_or_invalid_time() {
        // Given
        let root = create_temp_dir("api-update-invalid-time");
        let state = test_state(root.clone());
        let alarm = state
            .alarms
            .create(Default::default(), 1)
            .expect("create alarm");

        // When
        let (empty_status, _) = send(
            router(state.clone()),
            "PUT",
            "/api/alarms",
            Some(json!({ "id": alarm.id, "time": "" })),
        )
        .await;
        let (invalid_status, body) = send(
            router(state.clone()),
            "PUT",
            "/api/alarms",
            Some(json!({ "id": alarm.id, "time": "25:00" })),
        )
        .await;

        // Then
        assert_eq!(empty_status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid_status, StatusCode::BAD_REQUEST);
        let payload: JsonValue = json_from_slice(&body).expect("parse json");
        assert!(payload["error"].as_str().expect("error").contains("25:00"));
        let stored = state.alarms.get(&alarm.id).expect("alarm");
        assert_eq!(stored.time, "07:00");
        assert_eq!(stored.version, 0);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn create_alarm__should_reject_out_of_range_days_as_bad_request() {
        // Given
        let root = create_temp_dir("api-create-bad-days");
        let state = test_state(root.clone());

        // When
        let (negative, body) = send(
            router(state.clone()),
            "POST",
            "/api/alarms",
            Some(json!({ "days": [-1] })),
        )
        .await;
        let (too_large, _) = send(
            router(state.clone()),
            "POST",
            "/api/alarms",
            Some(json!({ "days": [256] })),
        )
        .await;
        let (weekday_seven, _) = send(
            router(state.clone()),
            "POST",
            "/api/alarms",
            Some(json!({ "days": [7] })),
        )
        .await;

        // Then
        assert_eq!(negative, StatusCode::BAD_REQUEST);
        assert_eq!(too_large, StatusCode::BAD_REQUEST);
        assert_eq!(weekday_seven, StatusCode::BAD_REQUEST);
        let payload: JsonValue = json_from_slice(&body).expect("parse json");
        assert!(payload["error"].is_string());
        assert!(state.alarms.list().is_empty());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn update_alarm__should_return_conflict_for_stale_version() {
        // Given
        let root = create_temp_dir("api-update-conflict");
        let state = test_state(root.clone());
        let alarm = state
            .alarms
            .create(Default::default(), 1)
            .expect("create alarm");
        state
            .alarms
            .update(&alarm.id, crate::types::alarm::AlarmPatch::deactivate(), None)
            .expect("first update");

        // When
        let (status, _) = send(
            router(state.clone()),
            "PUT",
            "/api/alarms",
            Some(json!({ "id": alarm.id, "label": "Late edit", "expectedVersion": 0 })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(state.alarms.get(&alarm.id).expect("alarm").label, "Alarm");

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn update_alarm__should_succeed_for_unknown_id() {
        let root = create_temp_dir("api-update-missing");
        let state = test_state(root.clone());

        let (status, _) = send(
            router(state.clone()),
            "PUT",
            "/api/alarms",
            Some(json!({ "id": "missing", "isActive": false })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(state.alarms.list().is_empty());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn delete_alarm__should_report_success_for_unknown_id() {
        // Given
        let root = create_temp_dir("api-delete");
        let state = test_state(root.clone());
        let alarm = state
            .alarms
            .create(Default::default(), 1)
            .expect("create alarm");

        // When
        let (unknown_status, _) =
            send(router(state.clone()), "DELETE", "/api/alarms?id=nope", None).await;
        let (known_status, _) = send(
            router(state.clone()),
            "DELETE",
            &format!("/api/alarms?id={}", alarm.id),
            None,
        )
        .await;

        // Then
        assert_eq!(unknown_status, StatusCode::OK);
        assert_eq!(known_status, StatusCode::OK);
        assert!(state.alarms.list().is_empty());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn snooze_alarm__should_create_snoozed_copy() {
        // Given
        let root = create_temp_dir("api-snooze");
        let state = test_state(root.clone());
        let alarm = state
            .alarms
            .create(
                crate::types::alarm::NewAlarm {
                    label: Some("Meeting".to_string()),
                    time: Some("09:00".to_string()),
                    ..Default::default()
                },
                1,
            )
            .expect("create alarm");

        // When
        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/api/alarms/snooze",
            Some(json!({ "alarmId": alarm.id })),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK);
        let snoozed: Alarm = json_from_slice(&body).expect("parse alarm");
        assert_eq!(snoozed.label, "Snoozed: Meeting");
        assert!(snoozed.days.is_empty());
        assert!(snoozed.is_active);
        assert_eq!(state.alarms.list().len(), 2);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn snooze_alarm__should_return_not_found_for_unknown_alarm() {
        let root = create_temp_dir("api-snooze-missing");
        let state = test_state(root.clone());

        let (status, _) = send(
            router(state),
            "POST",
            "/api/alarms/snooze",
            Some(json!({ "alarmId": "missing" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn claim_occurrence__should_grant_first_claim_only() {
        // Given
        let root = create_temp_dir("api-claim");
        let state = test_state(root.clone());
        let body = json!({ "alarmId": "1", "minute": "2025-01-13T07:00" });

        // When
        let (_, first) = send(
            router(state.clone()),
            "POST",
            "/api/occurrences/claim",
            Some(body.clone()),
        )
        .await;
        let (_, second) = send(
            router(state.clone()),
            "POST",
            "/api/occurrences/claim",
            Some(body),
        )
        .await;

        // Then
        let first: alarms::ClaimResponse = json_from_slice(&first).expect("parse first");
        let second: alarms::ClaimResponse = json_from_slice(&second).expect("parse second");
        assert!(first.claimed);
        assert!(!second.claimed);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn push_subscribe__should_deduplicate_by_endpoint() {
        // Given
        let root = create_temp_dir("api-subscribe");
        let state = test_state(root.clone());
        let subscription = json!({
            "endpoint": "X",
            "expirationTime": null,
            "keys": { "p256dh": "p256", "auth": "auth" }
        });

        // When
        for _ in 0..2 {
            let (status, _) = send(
                router(state.clone()),
                "POST",
                "/api/push",
                Some(subscription.clone()),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        // Then
        let stored = state.subscriptions.list();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].endpoint, "X");

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn push_subscribe__should_reject_missing_keys() {
        let root = create_temp_dir("api-subscribe-invalid");
        let state = test_state(root.clone());

        let (status, _) = send(
            router(state.clone()),
            "POST",
            "/api/push",
            Some(json!({ "endpoint": "X", "keys": { "p256dh": "", "auth": "auth" } })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.subscriptions.list().is_empty());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn push_public_key__should_return_stable_key_and_start_poller() {
        // Given
        let root = create_temp_dir("api-public-key");
        let state = test_state(root.clone());
        assert!(!state.poller.is_running());

        // When
        let (status, body) = send(router(state.clone()), "GET", "/api/push", None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        let response: push::PublicKeyResponse = json_from_slice(&body).expect("parse json");
        assert!(!response.public_key.is_empty());
        assert!(state.poller.is_running());

        let restarted = test_state(root.clone());
        assert_eq!(
            restarted.vapid.expect("vapid").public_key,
            response.public_key
        );

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn push_public_key__should_be_unavailable_with_incomplete_keys() {
        let root = create_temp_dir("api-public-key-incomplete");
        let state = state::AppState::new(config::AppConfig {
            data_dir: root.clone(),
            vapid_private_key: Some("private-only".to_string()),
            ..Default::default()
        });

        let (status, _) = send(router(state.clone()), "GET", "/api/push", None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!state.poller.is_running());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn poller_debug__should_report_window_and_state() {
        let root = create_temp_dir("api-poller-debug");
        let state = test_state(root.clone());

        let (status, body) = send(router(state), "GET", "/api/debug/poller", None).await;

        assert_eq!(status, StatusCode::OK);
        let raw: JsonValue = json_from_slice(&body).expect("parse json");
        let server_time = raw["serverTime"].as_str().expect("rfc3339 string");
        assert!(
            time::OffsetDateTime::parse(server_time, &time::format_description::well_known::Rfc3339)
                .is_ok()
        );
        let debug: push::PollerDebugResponse = json_from_slice(&body).expect("parse json");
        assert!(!debug.running);
        assert_eq!(debug.match_window_secs, 2);
        assert!(debug.server_time.unix_timestamp() > 0);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn service_worker__should_wire_snooze_action() {
        let root = create_temp_dir("api-sw");
        let state = test_state(root.clone());

        let (status, body) = send(router(state), "GET", "/sw.js", None).await;

        assert_eq!(status, StatusCode::OK);
        let script = String::from_utf8(body).expect("utf8");
        assert!(script.contains("fetch('/api/alarms/snooze'"));
        assert!(script.contains("action: 'dismiss'"));
        assert!(!script.contains("{{"));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }
}
