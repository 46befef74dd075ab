use crate::ports::AlarmApi;
use crate::types::alarm::{Alarm, AlarmPatch, NewAlarm};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("alarm was changed by someone else")]
    Conflict,
}

/// [`AlarmApi`] backed by the server's JSON endpoints.
#[derive(Clone)]
pub struct HttpAlarmApi {
    client: Client,
    base_url: String,
}

impl HttpAlarmApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody<'a> {
    id: &'a str,
    #[serde(flatten)]
    patch: &'a AlarmPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_version: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimBody<'a> {
    alarm_id: &'a str,
    minute: &'a str,
}

#[derive(Deserialize)]
struct ClaimReply {
    claimed: bool,
}

type ApiFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

impl AlarmApi for HttpAlarmApi {
    type Error = ClientError;
    type Fut<'a, T>
        = ApiFut<'a, T>
    where
        Self: 'a,
        T: 'a;

    fn list(&self) -> Self::Fut<'_, Vec<Alarm>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url("api/alarms"))
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json().await?)
        })
    }

    fn create<'a>(&'a self, alarm: &'a NewAlarm) -> Self::Fut<'a, Alarm> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("api/alarms"))
                .json(alarm)
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json().await?)
        })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        patch: &'a AlarmPatch,
        expected_version: Option<u64>,
    ) -> Self::Fut<'a, ()> {
        Box::pin(async move {
            let body = UpdateBody {
                id,
                patch,
                expected_version,
            };
            let response = self
                .client
                .put(self.url("api/alarms"))
                .json(&body)
                .send()
                .await?;
            if response.status() == reqwest::StatusCode::CONFLICT {
                return Err(ClientError::Conflict);
            }
            response.error_for_status()?;
            Ok(())
        })
    }

    fn claim<'a>(&'a self, alarm_id: &'a str, minute: &'a str) -> Self::Fut<'a, bool> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("api/occurrences/claim"))
                .json(&ClaimBody { alarm_id, minute })
                .send()
                .await?
                .error_for_status()?;
            let reply: ClaimReply = response.json().await?;
            Ok(reply.claimed)
        })
    }
}
