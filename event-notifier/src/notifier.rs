//! Broadcast messaging client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::BroadcastRequest;

use crate::error::{NotifierError, NotifierResult};

const SERVICE: &str = "messaging API";

/// Tokens issued by the messaging platform are at least this long
pub const MIN_TOKEN_LENGTH: usize = 40;

/// Delivers rendered text to the notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> NotifierResult<()>;
}

pub struct LineNotifier {
    http: Client,
    endpoint: String,
    token: String,
}

impl LineNotifier {
    pub fn new(http: Client, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn send(&self, text: &str) -> NotifierResult<()> {
        if self.token.trim().is_empty() {
            return Err(NotifierError::validation(
                "messaging channel access token is empty",
            ));
        }

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&BroadcastRequest::text(text))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("{} broadcast failed: {} - {}", SERVICE, status, body);
            return Err(NotifierError::upstream(SERVICE, status, body));
        }

        tracing::debug!("Broadcast sent ({} characters)", text.chars().count());
        Ok(())
    }
}

/// Check the shape of a channel access token without calling the API.
pub fn validate_token_format(token: &str) -> NotifierResult<()> {
    let token = token.trim();

    if token.is_empty() {
        return Err(NotifierError::validation("token is empty"));
    }

    let length = token.chars().count();
    if length < MIN_TOKEN_LENGTH {
        return Err(NotifierError::validation(format!(
            "token is too short ({} characters, expected at least {})",
            length, MIN_TOKEN_LENGTH
        )));
    }

    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
    {
        return Err(NotifierError::validation(
            "token contains invalid characters (expected A-Z, a-z, 0-9, +, /, =)",
        ));
    }

    Ok(())
}
