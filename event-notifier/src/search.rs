//! connpass event search client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::{ConnpassEvent, SearchResponse};

use crate::error::{NotifierError, NotifierResult};

const SERVICE: &str = "connpass API";

/// Anything that can list events matching a keyword
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn search(&self, keyword: &str) -> NotifierResult<Vec<ConnpassEvent>>;
}

/// Client for the connpass v2 events endpoint
pub struct ConnpassClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ConnpassClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl EventSource for ConnpassClient {
    async fn search(&self, keyword: &str) -> NotifierResult<Vec<ConnpassEvent>> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("keyword", keyword)])
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            tracing::error!("{} search failed for \"{}\": {} - {}", SERVICE, keyword, status, body);
            return Err(NotifierError::upstream(SERVICE, status, body));
        }

        parse_search_response(&body)
    }
}

/// Decode a search response body into its events.
pub fn parse_search_response(body: &str) -> NotifierResult<Vec<ConnpassEvent>> {
    let envelope: SearchResponse = serde_json::from_str(body)?;

    if let (Some(returned), Some(available)) =
        (envelope.results_returned, envelope.results_available)
    {
        tracing::debug!("Search returned {} of {} available events", returned, available);
    }

    Ok(envelope.into_events())
}
