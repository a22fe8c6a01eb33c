//! Record store REST client.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::warn;

use recal_core::clients::LedgerStore;
use recal_core::config::{EngineConfig, LedgerConfig};
use recal_core::{LedgerRecord, RecordPatch, SyncError, SyncResult};

use crate::model::{RecordList, patch_body};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LedgerClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    backoff: Duration,
    max_retries: u32,
}

impl LedgerClient {
    pub fn new(ledger: &LedgerConfig, engine: &EngineConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build http client: {e}")))?;

        Ok(LedgerClient {
            http,
            base_url: ledger.base_url.trim_end_matches('/').to_string(),
            token: ledger.api_token.clone(),
            backoff: Duration::from_secs(engine.retry_backoff_secs),
            max_retries: engine.max_retries,
        })
    }

    /// Point the client at a different API root (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn records_url(&self) -> String {
        format!("{}/records", self.base_url)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/records/{}", self.base_url, urlencoding::encode(id))
    }

    async fn send_with_retry<F>(&self, build: F) -> SyncResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempts = 0;
        loop {
            let response = build()
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| SyncError::Transient(e.to_string()))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                attempts += 1;
                if attempts > self.max_retries {
                    return Err(SyncError::RateLimited);
                }
                warn!(attempt = attempts, "rate limited by ledger api, backing off");
                sleep(self.backoff).await;
                continue;
            }

            return Ok(response);
        }
    }

    /// Fetch every page of records matching the given query.
    async fn fetch_pages(&self, query: &[(&str, &str)]) -> SyncResult<Vec<LedgerRecord>> {
        let url = self.records_url();
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let response = self
                .send_with_retry(|| {
                    let mut request = self.http.get(&url).query(query);
                    if let Some(offset) = offset.as_deref() {
                        request = request.query(&[("offset", offset)]);
                    }
                    request
                })
                .await?;

            let response = error_for_status(response, "list records").await?;
            let list: RecordList = response
                .json()
                .await
                .map_err(|e| SyncError::Serialization(e.to_string()))?;

            records.extend(
                list.records
                    .into_iter()
                    .filter_map(|record| record.into_record()),
            );

            match list.offset {
                Some(token) if !token.is_empty() => offset = Some(token),
                _ => break,
            }
        }

        Ok(records)
    }
}

async fn error_for_status(response: reqwest::Response, what: &str) -> SyncResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => SyncError::Auth(format!("{what}: {status}")),
        404 | 410 => SyncError::NotFound(what.to_string()),
        400 | 422 => SyncError::Validation(format!("{what}: {detail}")),
        429 => SyncError::RateLimited,
        _ if status.is_server_error() => SyncError::Transient(format!("{what}: {status}")),
        _ => SyncError::Ledger(format!("{what}: {status} {detail}")),
    })
}

impl LedgerStore for LedgerClient {
    async fn fetch_unprocessed(
        &self,
        calendar_key: Option<&str>,
    ) -> SyncResult<Vec<LedgerRecord>> {
        let mut query = vec![("processed", "false")];
        if let Some(key) = calendar_key {
            query.push(("calendarKey", key));
        }
        self.fetch_pages(&query).await
    }

    async fn fetch_all(&self) -> SyncResult<Vec<LedgerRecord>> {
        self.fetch_pages(&[]).await
    }

    async fn update_record(&self, id: &str, patch: &RecordPatch) -> SyncResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let url = self.record_url(id);
        let body = patch_body(patch);
        let response = self
            .send_with_retry(|| self.http.patch(&url).json(&body))
            .await?;

        error_for_status(response, "update record").await?;
        Ok(())
    }
}
