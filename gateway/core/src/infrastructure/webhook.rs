// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Webhook Publisher - HTTP sink for the face-events topic
//
// POSTs each FaceEvent as JSON. Network errors, 408, 429 and 5xx are
// transient (retried by the dispatcher); other 4xx are permanent.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::domain::events::{EventPublisher, FaceEvent, PublishError};

pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
    topic: String,
}

impl WebhookPublisher {
    pub fn new(url: String, topic: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            topic,
        }
    }
}

#[async_trait]
impl EventPublisher for WebhookPublisher {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, event: &FaceEvent) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-event-topic", &self.topic)
            .header("x-correlation-id", event.correlation_id.as_str())
            .json(event)
            .send()
            .await
            .map_err(|e| PublishError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = format!("HTTP {}", status);
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            Err(PublishError::Transient(message))
        } else {
            Err(PublishError::Permanent(message))
        }
    }
}
