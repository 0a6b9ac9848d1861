// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Dispatcher - at-least-once publication of face-events
//
// Publication runs as a detached task, never awaited by the request path.
// Each sink is retried independently with exponential backoff
// (initial_backoff * 2^attempt, capped at max_backoff) while failures are
// transient; after the last attempt the event is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::events::{EventPublisher, FaceEvent, PublishError};
use crate::domain::gateway_config::RetryConfig;
use crate::infrastructure::telemetry;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[derive(Clone)]
pub struct EventDispatcher {
    sinks: Arc<Vec<Arc<dyn EventPublisher>>>,
    policy: RetryPolicy,
}

impl EventDispatcher {
    pub fn new(sinks: Vec<Arc<dyn EventPublisher>>, policy: RetryPolicy) -> Self {
        Self {
            sinks: Arc::new(sinks),
            policy,
        }
    }

    /// Publish to every sink in the background. The handle is only useful to
    /// tests; the request path drops it.
    pub fn dispatch(&self, event: FaceEvent) -> JoinHandle<()> {
        let sinks = self.sinks.clone();
        let policy = self.policy.clone();

        tokio::spawn(async move {
            let publishes = sinks
                .iter()
                .map(|sink| publish_with_retry(sink.as_ref(), &event, &policy));
            futures::future::join_all(publishes).await;
        })
    }
}

/// Publish `event` to one sink, retrying transient failures.
pub async fn publish_with_retry(
    sink: &dyn EventPublisher,
    event: &FaceEvent,
    policy: &RetryPolicy,
) -> Result<(), PublishError> {
    let mut attempt = 0;
    loop {
        match sink.publish(event).await {
            Ok(()) => {
                debug!(
                    sink = sink.name(),
                    correlation_id = %event.correlation_id,
                    attempt = attempt + 1,
                    "Face event published"
                );
                telemetry::record_event_published(sink.name());
                return Ok(());
            }
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                debug!(
                    sink = sink.name(),
                    correlation_id = %event.correlation_id,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Publish failed, retrying"
                );
                telemetry::record_publish_retry(sink.name());
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    sink = sink.name(),
                    correlation_id = %event.correlation_id,
                    attempts = attempt + 1,
                    error = %e,
                    "Dropping face event"
                );
                telemetry::record_event_dropped(sink.name());
                return Err(e);
            }
        }
    }
}
