// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Review notification adapters
//
// WebhookNotifier POSTs the notification as JSON; LogNotifier only records it.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::domain::notification::{NotificationError, Notifier, ReviewNotification};

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Network(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &ReviewNotification) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotificationError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Notifier used when no webhook is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &ReviewNotification) -> Result<(), NotificationError> {
        info!(
            suggestion_id = %notification.suggestion_id,
            action = %notification.action,
            actor = %notification.actor,
            "Suggestion reviewed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::suggestion::{ReviewAction, SuggestionId};
    use chrono::Utc;

    fn notification() -> ReviewNotification {
        ReviewNotification {
            suggestion_id: SuggestionId::new(),
            action: ReviewAction::Approve,
            actor: "alice".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_webhook_posts_camel_case_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hooks/review")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "action": "approve",
                "actor": "alice",
            })))
            .with_status(204)
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(
            format!("{}/hooks/review", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        notifier.notify(&notification()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_reports_rejection() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/").with_status(500).create_async().await;

        let notifier = WebhookNotifier::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = notifier.notify(&notification()).await.unwrap_err();

        assert!(matches!(err, NotificationError::Rejected(500)));
    }
}
