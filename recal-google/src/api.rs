//! Calendar v3 REST client.
//!
//! Implements `CalendarApi` with a bearer token supplied per request by the
//! injected `CredentialProvider`. Rate-limit responses are retried with a
//! fixed backoff up to the configured ceiling; deleting an already-deleted
//! event is success.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, warn};

use recal_core::clients::{CalendarApi, CredentialProvider, EventPage};
use recal_core::config::EngineConfig;
use recal_core::{CalendarEvent, NewEvent, SyncError, SyncResult};

use crate::model::{GoogleEvent, GoogleEventList, event_body};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: &str = "2500";

pub struct GoogleCalendar<P> {
    http: reqwest::Client,
    base_url: String,
    credentials: P,
    backoff: Duration,
    max_retries: u32,
}

impl<P: CredentialProvider> GoogleCalendar<P> {
    pub fn new(credentials: P, config: &EngineConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build http client: {e}")))?;

        Ok(GoogleCalendar {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
            backoff: Duration::from_secs(config.retry_backoff_secs),
            max_retries: config.max_retries,
        })
    }

    /// Point the client at a different API root (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// Send a request, retrying on rate-limit responses. The builder closure
    /// runs once per attempt; the bearer token is resolved fresh each time.
    async fn send_with_retry<F>(&self, build: F) -> SyncResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempts = 0;
        loop {
            let token = self.credentials.current_token()?;
            let response = build()
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| SyncError::Transient(e.to_string()))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                attempts += 1;
                if attempts > self.max_retries {
                    return Err(SyncError::RateLimited);
                }
                warn!(attempt = attempts, "rate limited by calendar api, backing off");
                sleep(self.backoff).await;
                continue;
            }

            return Ok(response);
        }
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
        _ => SyncError::Calendar(format!("{what}: {status} {detail}")),
    })
}

impl<P: CredentialProvider> CalendarApi for GoogleCalendar<P> {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: Option<DateTime<Utc>>,
        page_token: Option<&str>,
    ) -> SyncResult<EventPage> {
        let url = self.events_url(calendar_id);
        let response = self
            .send_with_retry(|| {
                let mut request = self
                    .http
                    .get(&url)
                    .query(&[
                        ("singleEvents", "true"),
                        ("showDeleted", "false"),
                        ("maxResults", PAGE_SIZE),
                    ])
                    .query(&[("timeMin", time_min.to_rfc3339())]);
                if let Some(time_max) = time_max {
                    request = request.query(&[("timeMax", time_max.to_rfc3339())]);
                }
                if let Some(token) = page_token {
                    request = request.query(&[("pageToken", token)]);
                }
                request
            })
            .await?;

        let response = error_for_status(response, "list events").await?;
        let list: GoogleEventList = response
            .json()
            .await
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        Ok(EventPage {
            items: list
                .items
                .into_iter()
                .filter_map(GoogleEvent::into_core)
                .collect(),
            next_page_token: list.next_page_token,
        })
    }

    async fn get_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> SyncResult<Option<CalendarEvent>> {
        let url = self.event_url(calendar_id, event_id);
        let response = self.send_with_retry(|| self.http.get(&url)).await?;

        if matches!(response.status().as_u16(), 404 | 410) {
            return Ok(None);
        }

        let response = error_for_status(response, "get event").await?;
        let event: GoogleEvent = response
            .json()
            .await
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        Ok(event.into_core())
    }

    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> SyncResult<String> {
        let url = self.events_url(calendar_id);
        let body = event_body(event);
        let response = self
            .send_with_retry(|| self.http.post(&url).json(&body))
            .await?;

        let response = error_for_status(response, "create event").await?;
        let created: GoogleEvent = response
            .json()
            .await
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        if created.id.is_empty() {
            return Err(SyncError::Calendar(
                "create event returned no event id".to_string(),
            ));
        }
        Ok(created.id)
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &NewEvent,
    ) -> SyncResult<()> {
        let url = self.event_url(calendar_id, event_id);
        let body = event_body(event);
        let response = self
            .send_with_retry(|| self.http.put(&url).json(&body))
            .await?;

        error_for_status(response, "update event").await?;
        Ok(())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> SyncResult<()> {
        let url = self.event_url(calendar_id, event_id);
        let response = self.send_with_retry(|| self.http.delete(&url)).await?;

        // Deleting an already-deleted event is success, not failure.
        if matches!(response.status().as_u16(), 404 | 410) {
            debug!(event = event_id, "event already gone");
            return Ok(());
        }

        error_for_status(response, "delete event").await?;
        Ok(())
    }
}
