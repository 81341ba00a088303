use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::error::NotifyError;
use super::{format_update_message, Notifier};
use crate::retry::{self, RetryAction, RetryConfig};
use crate::store::ItemId;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord caps message content at 2000 characters.
const MAX_CONTENT_LEN: usize = 2000;

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts update reports to a Discord-compatible incoming webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &"<redacted>")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, retry: RetryConfig) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry,
        })
    }

    async fn post(&self, content: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookMessage { content })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::HttpStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Split `message` on `", "` boundaries into pieces that fit one message.
fn split_content(message: &str, limit: usize) -> Vec<String> {
    if message.len() <= limit {
        return vec![message.to_string()];
    }
    let mut parts = Vec::new();
    let mut current = String::new();
    for piece in message.split_inclusive(", ") {
        if !current.is_empty() && current.len() + piece.len() > limit {
            parts.push(current.trim_end_matches(", ").to_string());
            current.clear();
        }
        current.push_str(piece);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, changed: &[ItemId]) -> Result<(), NotifyError> {
        let message = format_update_message(changed);
        for content in split_content(&message, MAX_CONTENT_LEN) {
            retry::retry_with_backoff(
                &self.retry,
                |e: &NotifyError| {
                    if e.is_retryable() {
                        RetryAction::Retry
                    } else {
                        RetryAction::Abort
                    }
                },
                || self.post(&content),
            )
            .await?;
        }
        tracing::info!(count = changed.len(), "Posted update report to webhook");
        Ok(())
    }
}
