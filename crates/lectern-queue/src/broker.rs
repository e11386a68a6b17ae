//! In-process progress event broker.
//!
//! Topics are video IDs. Every subscriber owns a bounded mailbox; publishing
//! never blocks and a full mailbox loses the message for that subscriber only.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures_util::Stream;
use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use lectern_models::PipelineEvent;

use crate::error::QueueResult;

/// Default mailbox capacity per subscriber.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

const EVENTS_PUBLISHED_TOTAL: &str = "lectern_events_published_total";
const EVENTS_DROPPED_TOTAL: &str = "lectern_events_dropped_total";

struct Mailbox {
    id: u64,
    tx: mpsc::Sender<Arc<str>>,
}

#[derive(Default)]
struct Registry {
    topics: Mutex<HashMap<String, Vec<Mailbox>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Mailbox>>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, topic: &str, id: u64) {
        let mut topics = self.lock();
        if let Some(mailboxes) = topics.get_mut(topic) {
            mailboxes.retain(|m| m.id != id);
            if mailboxes.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

/// Topic-based publish/subscribe for pipeline progress.
#[derive(Clone)]
pub struct EventBroker {
    registry: Arc<Registry>,
    capacity: usize,
}

impl EventBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a new mailbox under `topic`.
    ///
    /// Only messages published after this call are delivered. Dropping the
    /// returned [`Subscription`] unregisters it.
    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);

        self.registry
            .lock()
            .entry(topic.clone())
            .or_default()
            .push(Mailbox { id, tx });
        debug!(topic = %topic, subscriber = id, "Subscribed to events");

        Subscription {
            rx,
            topic,
            id,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Serialize `event` once and offer it to every subscriber of `topic`.
    ///
    /// Returns how many mailboxes accepted the message.
    pub fn publish(&self, topic: &str, event: &PipelineEvent) -> QueueResult<usize> {
        let payload: Arc<str> = serde_json::to_string(event)?.into();
        Ok(self.publish_raw(topic, payload))
    }

    /// Offer an already serialized message to every subscriber of `topic`.
    pub fn publish_raw(&self, topic: &str, payload: Arc<str>) -> usize {
        let senders: Vec<(u64, mpsc::Sender<Arc<str>>)> = match self.registry.lock().get(topic) {
            Some(mailboxes) => mailboxes.iter().map(|m| (m.id, m.tx.clone())).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, tx) in senders {
            match tx.try_send(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(topic, subscriber = id, "Mailbox full, dropping event");
                    counter!(EVENTS_DROPPED_TOTAL).increment(1);
                }
                // Subscriber is being dropped
                Err(TrySendError::Closed(_)) => {}
            }
        }

        counter!(EVENTS_PUBLISHED_TOTAL).increment(1);
        delivered
    }

    /// Number of live mailboxes for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry.lock().get(topic).map_or(0, Vec::len)
    }

    /// Number of topics with at least one mailbox.
    pub fn topic_count(&self) -> usize {
        self.registry.lock().len()
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl std::fmt::Debug for EventBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroker")
            .field("capacity", &self.capacity)
            .field("topics", &self.topic_count())
            .finish()
    }
}

/// A subscriber's view of one topic: a stream of serialized JSON events.
///
/// The stream stays pending while the mailbox is empty and never ends on its
/// own. Dropping it removes the mailbox from the broker.
pub struct Subscription {
    rx: mpsc::Receiver<Arc<str>>,
    topic: String,
    id: u64,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Stream for Subscription {
    type Item = Arc<str>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(&self.topic, self.id);
        debug!(topic = %self.topic, subscriber = self.id, "Unsubscribed from events");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use lectern_models::{VideoStatus, PipelineEvent};
    use serde_json::Value;
    use tokio_test::{assert_pending, assert_ready, task};

    fn parse(msg: &str) -> Value {
        serde_json::from_str(msg).unwrap()
    }

    #[tokio::test]
    async fn test_publish_after_subscribe_delivers() {
        let broker = EventBroker::default();
        let mut sub = broker.subscribe("v_1");

        let accepted = broker.publish("v_1", &PipelineEvent::window_started(0)).unwrap();
        assert_eq!(accepted, 1);

        let msg = sub.next().await.unwrap();
        let json = parse(&msg);
        assert_eq!(json["type"], "window_started");
        assert_eq!(json["index"], 0);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_lost() {
        let broker = EventBroker::default();
        assert_eq!(broker.publish("v_1", &PipelineEvent::window_started(0)).unwrap(), 0);

        let mut sub = broker.subscribe("v_1");
        broker.publish("v_1", &PipelineEvent::window_started(1)).unwrap();
        let json = parse(&sub.next().await.unwrap());
        assert_eq!(json["index"], 1);
    }

    #[test]
    fn test_empty_subscription_is_pending() {
        let broker = EventBroker::default();
        let mut sub = broker.subscribe("v_1");

        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());

        broker.publish("v_1", &PipelineEvent::video_done(VideoStatus::Done)).unwrap();
        assert!(next.is_woken());
        let msg = assert_ready!(next.poll()).unwrap();
        assert_eq!(parse(&msg)["status"], "done");
    }

    #[tokio::test]
    async fn test_full_mailbox_drops_silently() {
        let broker = EventBroker::new(100);
        let mut sub = broker.subscribe("v_1");

        for i in 0..100 {
            assert_eq!(broker.publish("v_1", &PipelineEvent::window_started(i)).unwrap(), 1);
        }
        // 101st message is dropped for this subscriber without an error
        assert_eq!(broker.publish("v_1", &PipelineEvent::window_started(100)).unwrap(), 0);

        for i in 0..100 {
            let json = parse(&sub.next().await.unwrap());
            assert_eq!(json["index"], i);
        }
        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_affect_others() {
        let broker = EventBroker::new(1);
        let _slow = broker.subscribe("v_1");
        let mut fast = broker.subscribe("v_1");

        assert_eq!(broker.publish("v_1", &PipelineEvent::window_started(0)).unwrap(), 2);
        fast.next().await.unwrap();
        assert_eq!(broker.publish("v_1", &PipelineEvent::window_started(1)).unwrap(), 1);
        assert_eq!(parse(&fast.next().await.unwrap())["index"], 1);
    }

    #[test]
    fn test_drop_unsubscribes_and_removes_topic() {
        let broker = EventBroker::default();
        let a = broker.subscribe("v_1");
        let b = broker.subscribe("v_1");
        let _c = broker.subscribe("v_2");
        assert_eq!(broker.subscriber_count("v_1"), 2);
        assert_eq!(broker.topic_count(), 2);

        drop(a);
        assert_eq!(broker.subscriber_count("v_1"), 1);
        drop(b);
        assert_eq!(broker.subscriber_count("v_1"), 0);
        assert_eq!(broker.topic_count(), 1);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let broker = EventBroker::default();
        let mut sub = broker.subscribe("v_2");
        broker.publish("v_1", &PipelineEvent::window_started(0)).unwrap();
        broker.publish("v_2", &PipelineEvent::window_started(7)).unwrap();
        assert_eq!(parse(&sub.next().await.unwrap())["index"], 7);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(EventBroker::new(0).capacity(), 1);
    }
}
