use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::{IngredientSource, MenuEntryStore};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::models::{DayIngredients, MenuEntriesPayload, MenuSyncRequest};

const API_KEY_HEADER: &str = "X-API-Key";

/// HTTP client for the CookOps REST API
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

/// Error body shape used by the backend (`{"detail": "..."}`)
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, BackendError> {
        let response = self
            .client
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, BackendError> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.map_err(|e| self.transport_error(e))?;
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                detail: error_detail(&text),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout { secs: self.timeout_secs }
        } else {
            BackendError::Connection(err)
        }
    }
}

/// Prefer the backend's `detail` field; fall back to the raw body.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { detail: serde_json::Value::String(detail) }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl IngredientSource for BackendClient {
    async fn recipe_rows(&self, site_id: &str, date: NaiveDate) -> Result<DayIngredients, BackendError> {
        tracing::debug!("GET servizio/ingredients site={} date={}", site_id, date);
        self.get(
            "servizio/ingredients",
            &[
                ("site", site_id.to_string()),
                ("date", date.to_string()),
                ("view", "recipe".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl MenuEntryStore for BackendClient {
    async fn load_entries(&self, site_id: &str, date: NaiveDate) -> Result<MenuEntriesPayload, BackendError> {
        self.get(
            "servizio/menu-entries/sync",
            &[("site", site_id.to_string()), ("date", date.to_string())],
        )
        .await
    }

    async fn sync_entries(&self, request: &MenuSyncRequest) -> Result<MenuEntriesPayload, BackendError> {
        tracing::debug!(
            "POST servizio/menu-entries/sync site={} date={} entries={}",
            request.site_id,
            request.service_date,
            request.entries.len()
        );
        self.post("servizio/menu-entries/sync", request).await
    }
}
