// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over tokio broadcast channels. Events are
// published after the corresponding commit and are lost on restart.

use crate::domain::events::{DeduplicationEvent, SuggestionEvent};
use crate::domain::suggestion::SuggestionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Suggestion(SuggestionEvent),
    Deduplication(DeduplicationEvent),
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus; `capacity` events are buffered before the
    /// oldest are dropped for slow receivers.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_suggestion_event(&self, event: SuggestionEvent) {
        self.publish(DomainEvent::Suggestion(event));
    }

    pub fn publish_deduplication_event(&self, event: DeduplicationEvent) {
        self.publish(DomainEvent::Deduplication(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single suggestion
    pub fn subscribe_suggestion(&self, suggestion_id: SuggestionId) -> SuggestionEventReceiver {
        SuggestionEventReceiver {
            receiver: self.sender.subscribe(),
            suggestion_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
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

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one suggestion
pub struct SuggestionEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    suggestion_id: SuggestionId,
}

impl SuggestionEventReceiver {
    pub async fn recv(&mut self) -> Result<SuggestionEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::Suggestion(event) = event {
                if event.suggestion_id() == self.suggestion_id {
                    return Ok(event);
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn approved(id: SuggestionId) -> SuggestionEvent {
        SuggestionEvent::SuggestionApproved {
            suggestion_id: id,
            actor: "alice".to_string(),
            approved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();
        let id = SuggestionId::new();

        bus.publish_suggestion_event(approved(id));

        match receiver.recv().await.unwrap() {
            DomainEvent::Suggestion(event) => assert_eq!(event.suggestion_id(), id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_suggestion_filter_skips_other_suggestions() {
        let bus = EventBus::new(10);
        let wanted = SuggestionId::new();
        let mut receiver = bus.subscribe_suggestion(wanted);

        bus.publish_suggestion_event(approved(SuggestionId::new()));
        bus.publish_deduplication_event(DeduplicationEvent::RunStarted {
            run_id: uuid::Uuid::new_v4(),
            batch_size: 10,
            started_at: Utc::now(),
        });
        bus.publish_suggestion_event(approved(wanted));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.suggestion_id(), wanted);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish_suggestion_event(approved(SuggestionId::new()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_try_recv_empty() {
        let bus = EventBus::new(4);
        let mut receiver = bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
