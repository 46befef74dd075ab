use crate::templates::ServiceWorkerTemplate;

use askama::Template;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub(crate) const SNOOZE_PATH: &str = "/api/alarms/snooze";

pub(crate) async fn service_worker() -> Response {
    let template = ServiceWorkerTemplate {
        icon: "/icon.png",
        snooze_path: SNOOZE_PATH,
        open_path: "/alarm",
    };
    match template.render() {
        Ok(script) => (
            [
                ("content-type", "application/javascript"),
                ("cache-control", "no-cache"),
            ],
            script,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to render service worker");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
