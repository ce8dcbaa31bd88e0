//! In-process, best-effort topic bus.
//!
//! A single [`TopicBus`] is shared across the whole process and carries every
//! domain event regardless of entity kind — topics are plain strings
//! (`"friend:42"`, `"message:17"`, ...), created lazily on first subscribe and
//! torn down the moment their last subscriber disappears. Publishing never
//! blocks: each subscriber has its own bounded delivery slot, and a publish
//! that finds a full slot drops the new event for that subscriber rather than
//! waiting or evicting something already queued — the same `select { case
//! ch <- data: default: }` contract as the original pubsub package. Reconnecting
//! clients recover dropped events through delta-sync, not through the bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};

use super::error::TopicError;

/// Default bounded capacity for a single subscriber's delivery slot.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

struct Inner<M> {
    topics: RwLock<HashMap<String, Vec<(u64, mpsc::Sender<M>)>>>,
    channel_capacity: usize,
    next_id: AtomicU64,
}

/// Shared handle to the process-wide event bus.
///
/// Cheap to clone; every clone refers to the same topic table.
pub struct TopicBus<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for TopicBus<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Clone + Send + 'static> TopicBus<M> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: RwLock::new(HashMap::new()),
                channel_capacity,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to a single topic, creating it if it does not yet exist.
    pub async fn subscribe(&self, topic: impl Into<String>) -> Subscription<M> {
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(self.inner.channel_capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut topics = self.inner.topics.write().await;
            topics.entry(topic.clone()).or_default().push((id, tx));
        }
        Subscription {
            bus: self.clone(),
            topic,
            id,
            rx: Some(rx),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribe to many topics at once, merging them into a single delivery
    /// slot. Closing the returned [`BulkSubscription`] unsubscribes from every
    /// underlying topic.
    pub async fn bulk_subscribe(&self, topics: impl IntoIterator<Item = String>) -> BulkSubscription<M> {
        let (merged_tx, merged_rx) = mpsc::channel(self.inner.channel_capacity);
        let mut handles = Vec::new();

        for topic in topics {
            let mut sub = self.subscribe(topic).await;
            let merged_tx = merged_tx.clone();
            let handle = tokio::spawn(async move {
                loop {
                    match sub.recv().await {
                        Ok(msg) => {
                            if merged_tx.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Err(TopicError::Lagged(_)) => continue,
                        Err(TopicError::ChannelClosed) => break,
                    }
                }
                sub
            });
            handles.push(handle);
        }
        drop(merged_tx);

        BulkSubscription {
            rx: merged_rx,
            forwarders: handles,
            closed: AtomicBool::new(false),
        }
    }

    /// Publish to a topic. A no-op if the topic has no subscribers — no
    /// allocation, no buffering. Each subscriber's slot is tried
    /// independently: a full slot drops this event for that subscriber only,
    /// the publish call itself never blocks or retries.
    pub async fn publish(&self, topic: &str, msg: M) {
        let topics = self.inner.topics.read().await;
        if let Some(senders) = topics.get(topic) {
            for (_, tx) in senders {
                let _ = tx.try_send(msg.clone());
            }
        }
    }

    pub async fn exists(&self, topic: &str) -> bool {
        self.inner.topics.read().await.contains_key(topic)
    }

    pub async fn list_topics(&self) -> Vec<String> {
        self.inner.topics.read().await.keys().cloned().collect()
    }

    /// Force-close a single topic: every current subscriber sees the stream end.
    pub async fn close(&self, topic: &str) {
        self.inner.topics.write().await.remove(topic);
    }

    /// Force-close every topic.
    pub async fn close_all(&self) {
        self.inner.topics.write().await.clear();
    }

    /// Remove a single subscriber's slot, tearing the topic down if it was
    /// the last one.
    async fn unsubscribe(&self, topic: &str, id: u64) {
        let mut topics = self.inner.topics.write().await;
        if let Some(senders) = topics.get_mut(topic) {
            senders.retain(|(sid, _)| *sid != id);
            if senders.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl<M: Clone + Send + 'static> Default for TopicBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-topic subscription backed by its own bounded slot. Call `close`
/// to unsubscribe deterministically; without it the slot stays registered
/// (harmless — a closed receiver just makes every future `try_send` to it
/// fail silently) until the bus itself is torn down.
pub struct Subscription<M> {
    bus: TopicBus<M>,
    topic: String,
    id: u64,
    rx: Option<mpsc::Receiver<M>>,
    closed: AtomicBool,
}

impl<M: Clone + Send + 'static> Subscription<M> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn recv(&mut self) -> Result<M, TopicError> {
        match &mut self.rx {
            Some(rx) => rx.recv().await.ok_or(TopicError::ChannelClosed),
            None => Err(TopicError::ChannelClosed),
        }
    }

    /// Idempotent close: safe to call more than once, from more than one path
    /// (e.g. both a stream's cancellation branch and its error branch).
    pub async fn close(&mut self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.rx.take();
        self.bus.unsubscribe(&self.topic, self.id).await;
    }
}

/// A merged subscription across several topics, created by [`TopicBus::bulk_subscribe`].
pub struct BulkSubscription<M> {
    rx: mpsc::Receiver<M>,
    forwarders: Vec<tokio::task::JoinHandle<Subscription<M>>>,
    closed: AtomicBool,
}

impl<M: Clone + Send + 'static> BulkSubscription<M> {
    pub async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Unsubscribe from every underlying topic and stop every forwarder task.
    pub async fn close(&mut self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        for handle in self.forwarders.drain(..) {
            handle.abort();
            if let Ok(mut sub) = handle.await {
                sub.close().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_with_no_subscribers_is_noop() {
        let bus: TopicBus<u32> = TopicBus::new();
        bus.publish("friend:1", 7).await;
        assert!(!bus.exists("friend:1").await);
    }

    #[tokio::test]
    async fn subscribe_then_publish_delivers() {
        let bus: TopicBus<u32> = TopicBus::new();
        let mut sub = bus.subscribe("friend:1").await;
        bus.publish("friend:1", 7).await;
        assert_eq!(sub.recv().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn closing_last_subscriber_tears_down_topic() {
        let bus: TopicBus<u32> = TopicBus::new();
        let mut sub = bus.subscribe("friend:1").await;
        assert!(bus.exists("friend:1").await);
        sub.close().await;
        assert!(!bus.exists("friend:1").await);
    }

    #[tokio::test]
    async fn closing_one_of_two_subscribers_keeps_topic_alive() {
        let bus: TopicBus<u32> = TopicBus::new();
        let mut a = bus.subscribe("friend:1").await;
        let b = bus.subscribe("friend:1").await;
        a.close().await;
        assert!(bus.exists("friend:1").await);
        drop(b);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let bus: TopicBus<u32> = TopicBus::new();
        let mut sub = bus.subscribe("friend:1").await;
        sub.close().await;
        sub.close().await; // must not panic or double-teardown
        assert!(!bus.exists("friend:1").await);
    }

    #[tokio::test]
    async fn bulk_subscribe_merges_multiple_topics() {
        let bus: TopicBus<u32> = TopicBus::new();
        let mut bulk = bus
            .bulk_subscribe(vec!["friend:1".to_string(), "friend:2".to_string()])
            .await;
        bus.publish("friend:1", 1).await;
        bus.publish("friend:2", 2).await;

        let mut seen = vec![
            bulk.recv().await.unwrap(),
            bulk.recv().await.unwrap(),
        ];
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
        bulk.close().await;
    }

    #[tokio::test]
    async fn bulk_subscribe_close_unsubscribes_every_topic() {
        let bus: TopicBus<u32> = TopicBus::new();
        let mut bulk = bus
            .bulk_subscribe(vec!["a".to_string(), "b".to_string()])
            .await;
        bulk.close().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!bus.exists("a").await);
        assert!(!bus.exists("b").await);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_newest_under_backpressure_instead_of_stalling() {
        let bus: TopicBus<u32> = TopicBus::with_capacity(2);
        let mut sub = bus.subscribe("t").await;
        // Slot capacity 2: publishing 10 events without ever reading fills
        // the slot and silently drops everything past it, it never blocks.
        for i in 0..10u32 {
            bus.publish("t", i).await;
        }
        assert_eq!(sub.recv().await.unwrap(), 0);
        assert_eq!(sub.recv().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn publish_after_close_is_a_noop() {
        let bus: TopicBus<u32> = TopicBus::new();
        let mut sub = bus.subscribe("t").await;
        sub.close().await;
        bus.publish("t", 1).await;
        assert!(!bus.exists("t").await);
    }
}
