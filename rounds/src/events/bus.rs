//! Broadcast bus for story events
//!
//! Pub/sub over a Tokio broadcast channel. Publishing is best-effort:
//! settlement and admission never fail because nobody is listening.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::StoryEvent;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to an EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Event bus with broadcast fan-out
pub struct EventBus {
    sender: broadcast::Sender<StoryEvent>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers
    ///
    /// No receivers is fine; the event is simply dropped.
    pub fn publish(&self, event: StoryEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "event published"),
            Err(_) => debug!(event_type, "event published (no receivers)"),
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<StoryEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(StoryEvent::StoryCreated {
            story_id: "s1".to_string(),
            opening_preview: "Once.".to_string(),
            timestamp: Utc::now(),
        });

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "story_created");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(StoryEvent::StoryCreated {
            story_id: "s1".to_string(),
            opening_preview: "Once.".to_string(),
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new().shared();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(StoryEvent::VoteCast {
            round_id: "r1".to_string(),
            submission_id: "sub-1".to_string(),
            vote_count: 1,
            timestamp: Utc::now(),
        });

        assert_eq!(rx1.recv().await.unwrap().event_type(), "vote_cast");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "vote_cast");
    }
}
