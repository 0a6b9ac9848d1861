// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - in-process face-events sink
//
// Provides in-memory FaceEvent streaming using tokio broadcast channels.
// Feeds the `/events` SSE endpoint and any in-process observers.
// Events are not persisted; durable delivery belongs to external sinks.

use async_trait::async_trait;
use futures::stream::Stream;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::domain::events::{EventPublisher, FaceEvent, PublishError};

/// Event bus for publishing and subscribing to face events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<FaceEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before slow
    /// receivers start lagging
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to all face events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Live event stream, optionally limited to one correlation id.
    /// Subscribes immediately; events published afterwards are delivered.
    pub fn stream(
        &self,
        correlation_id: Option<String>,
    ) -> impl Stream<Item = FaceEvent> + Send + 'static {
        self.subscribe().into_stream(correlation_id)
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    fn name(&self) -> &'static str {
        "event_bus"
    }

    async fn publish(&self, event: &FaceEvent) -> Result<(), PublishError> {
        debug!(correlation_id = %event.correlation_id, "Publishing face event");

        // send() only fails when nobody is subscribed, which is not an error here
        let receiver_count = self.sender.send(event.clone()).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to face events");
        }
        Ok(())
    }
}

/// Receiver for all face events
pub struct EventReceiver {
    receiver: broadcast::Receiver<FaceEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<FaceEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<FaceEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Lagged receivers skip the lost events with a warning.
    pub fn into_stream(
        self,
        correlation_id: Option<String>,
    ) -> impl Stream<Item = FaceEvent> + Send + 'static {
        BroadcastStream::new(self.receiver).filter_map(move |item| match item {
            Ok(event) => match &correlation_id {
                Some(wanted) if event.correlation_id.as_str() != wanted => None,
                _ => Some(event),
            },
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                warn!("Event stream lagged by {} events", n);
                None
            }
        })
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detection::{BoundingBox, RequestId};
    use std::time::Duration;
    use crate::domain::events::EventDetection;
    use chrono::Utc;

    fn event(correlation_id: &str) -> FaceEvent {
        FaceEvent {
            source: "test".to_string(),
            image_uri: "https://example.com/a.jpg".to_string(),
            detections: vec![EventDetection {
                bbox: BoundingBox::new(1.0, 1.0, 2.0, 2.0),
                confidence: 0.9,
            }],
            created_at: Utc::now(),
            correlation_id: RequestId::from_caller(correlation_id).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(&event("corr-1")).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.correlation_id.as_str(), "corr-1");
    }

    #[tokio::test]
    async fn test_stream_filters_by_correlation_id() {
        let event_bus = EventBus::new(10);
        let mut stream = Box::pin(event_bus.stream(Some("mine".to_string())));

        event_bus.publish(&event("other")).await.unwrap();
        event_bus.publish(&event("mine")).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.correlation_id.as_str(), "mine");
    }

    #[tokio::test]
    async fn test_stream_skips_lagged_events() {
        let event_bus = EventBus::new(2);
        let mut stream = Box::pin(event_bus.stream(None));

        for id in ["a", "b", "c", "d"] {
            event_bus.publish(&event(id)).await.unwrap();
        }

        let first = stream.next().await.unwrap();
        assert_eq!(first.correlation_id.as_str(), "c");
        assert_eq!(stream.next().await.unwrap().correlation_id.as_str(), "d");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        event_bus.publish(&event("corr-2")).await.unwrap();

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let event_bus = EventBus::new(10);
        assert!(event_bus.publish(&event("corr-3")).await.is_ok());
        let mut late = event_bus.subscribe();
        assert!(matches!(late.try_recv(), Err(EventBusError::Empty)));
    }
}
