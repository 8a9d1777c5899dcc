//! JSON-over-HTTP external store client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use hl_core::{ExportMeasurement, ExternalId, ExternalMeasurement, MetricType};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::store::{
    CharacteristicKind, CharacteristicValue, DailyStatisticSeries, ExternalStore, StatisticKind,
    StoreError,
};

/// Default request timeout for store calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the external store.
///
/// # Thread Safety
///
/// The client is safe to share across tasks. Clones share the underlying
/// HTTP connection pool.
#[derive(Clone)]
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for HttpStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStore")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [ExternalId],
}

#[derive(Deserialize)]
struct CharacteristicResponse {
    value: String,
}

impl HttpStore {
    /// Creates a client for the store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or whitespace-only, or if the
    /// HTTP client fails to build.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, StoreError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(StoreError::Unavailable {
                reason: "access token cannot be empty".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(StoreError::ClientBuild)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }
}

fn status_error(status: StatusCode, body: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unavailable {
            reason: format!("access denied ({status})"),
        },
        _ => StoreError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

fn not_found(response: &reqwest::Response, what: &str) -> Result<(), StoreError> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(StoreError::Status {
            status: StatusCode::NOT_FOUND.as_u16(),
            body: format!("{what} not found"),
        });
    }
    Ok(())
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StoreError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|err| StoreError::InvalidResponse(err.to_string()))
}

#[async_trait]
impl ExternalStore for HttpStore {
    async fn fetch_measurements(
        &self,
        metric: MetricType,
        since: NaiveDate,
    ) -> Result<Vec<ExternalMeasurement>, StoreError> {
        let request = self
            .http
            .get(self.url(&format!("measurements/{metric}")))
            .query(&[("since", since.format("%Y-%m-%d").to_string())]);
        let response = self.send(request).await?;
        not_found(&response, "measurements")?;
        parse_json(response).await
    }

    async fn fetch_daily_statistic(
        &self,
        kind: StatisticKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DailyStatisticSeries, StoreError> {
        let request = self
            .http
            .get(self.url(&format!("statistics/{}", kind.as_str())))
            .query(&[
                ("from", from.format("%Y-%m-%d").to_string()),
                ("to", to.format("%Y-%m-%d").to_string()),
            ]);
        let response = self.send(request).await?;
        not_found(&response, "statistic")?;
        parse_json(response).await
    }

    async fn export_measurements(&self, exports: &[ExportMeasurement]) -> Result<(), StoreError> {
        if exports.is_empty() {
            return Ok(());
        }
        let response = self
            .send(self.http.post(self.url("measurements")).json(exports))
            .await?;
        not_found(&response, "measurements endpoint")
    }

    async fn delete_measurements(&self, ids: &[ExternalId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let response = self
            .send(
                self.http
                    .post(self.url("measurements/delete"))
                    .json(&DeleteRequest { ids }),
            )
            .await?;
        not_found(&response, "delete endpoint")
    }

    async fn fetch_characteristic(
        &self,
        kind: CharacteristicKind,
    ) -> Result<Option<CharacteristicValue>, StoreError> {
        let request = self
            .http
            .get(self.url(&format!("characteristics/{}", kind.as_str())));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload: CharacteristicResponse = parse_json(response).await?;
        CharacteristicValue::parse(kind, &payload.value).map(Some)
    }
}
