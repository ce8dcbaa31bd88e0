//! Ephemeral typing-indicator fan-out.
//!
//! Typing events are not part of [`crate::domain::DomainEvent`] — they are
//! never persisted and a reconnecting client recovers nothing about them
//! through delta-sync, so they get their own small bus rather than a
//! `DomainEvent` variant nobody would ever query for ("TypingEvent" is not a
//! sync class, see `sync::SyncEngine`).

use crate::data::topics::TopicBus;

use super::pb::TypingEvent;

pub struct TypingBus {
    bus: TopicBus<TypingEvent>,
}

impl TypingBus {
    pub fn new() -> Self {
        Self {
            bus: TopicBus::new(),
        }
    }

    pub fn inner(&self) -> &TopicBus<TypingEvent> {
        &self.bus
    }

    fn topic(channel_id: &str) -> String {
        format!("typing:{channel_id}")
    }

    pub async fn publish(&self, channel_id: &str, event: TypingEvent) {
        self.bus.publish(&Self::topic(channel_id), event).await;
    }

    pub async fn subscribe(&self, channel_id: &str) -> crate::data::topics::Subscription<TypingEvent> {
        self.bus.subscribe(Self::topic(channel_id)).await
    }
}

impl Default for TypingBus {
    fn default() -> Self {
        Self::new()
    }
}
