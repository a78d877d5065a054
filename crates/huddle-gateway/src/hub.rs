//! Topic-keyed broadcast hub.
//!
//! One `tokio::sync::broadcast` channel per live topic, held in a `DashMap` so
//! subscribe, unsubscribe and publish from many tasks only contend per shard.
//! Delivery is best-effort and at-most-once: events published before a
//! subscription exists are never seen by it, and a subscriber that falls more
//! than `capacity` events behind skips the overflow.
//!
//! A topic entry lives exactly as long as it has subscribers. Dropping the last
//! [`Subscription`] for a topic removes the entry.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use huddle_common::gateway_event::{MessageEvent, Topic};
use tokio::sync::broadcast::{self, error::RecvError};

/// Per-topic buffer used by [`global`] when nothing configured it first.
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

static GLOBAL: OnceLock<BroadcastHub> = OnceLock::new();

/// The process-wide hub, created on first access.
pub fn global() -> &'static BroadcastHub {
    GLOBAL.get_or_init(|| BroadcastHub::new(DEFAULT_TOPIC_CAPACITY))
}

/// Create the process-wide hub with `capacity` if it does not exist yet.
/// Later calls return the existing instance unchanged.
pub fn init_global(capacity: usize) -> &'static BroadcastHub {
    GLOBAL.get_or_init(|| BroadcastHub::new(capacity))
}

/// Cheap-to-clone handle; all clones share the same topic registry.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    topics: DashMap<Topic, broadcast::Sender<Arc<MessageEvent>>>,
    capacity: usize,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                topics: DashMap::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Start receiving events for `topic`.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        // The shard lock is held across `subscribe()`, so a concurrent prune
        // either sees this receiver or runs before the entry is recreated.
        let rx = self
            .inner
            .topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .subscribe();

        tracing::trace!(topic = %topic.key(), "Subscribed");
        Subscription {
            topic,
            rx: Some(rx),
            hub: Arc::clone(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber of its topic. Returns how
    /// many subscribers it reached; never fails.
    pub fn publish(&self, event: MessageEvent) -> usize {
        let topic = event.topic();
        let Some(tx) = self.inner.topics.get(&topic) else {
            tracing::trace!(topic = %topic.key(), "No subscribers, event dropped");
            return 0;
        };

        match tx.send(Arc::new(event)) {
            Ok(reached) => {
                tracing::trace!(topic = %topic.key(), reached, "Event published");
                reached
            }
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner
            .topics
            .get(topic)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }
}

/// Receiving end of one topic. Unregisters on drop.
pub struct Subscription {
    topic: Topic,
    rx: Option<broadcast::Receiver<Arc<MessageEvent>>>,
    hub: Arc<HubInner>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next event. Lagged events are skipped with a warning.
    /// Returns `None` only if the topic channel closed.
    pub async fn recv(&mut self) -> Option<Arc<MessageEvent>> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic.key(), skipped, "Subscriber lagged, events lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Arc<MessageEvent>> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic.key(), skipped, "Subscriber lagged, events lost");
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Release the receiver before checking, so our own count is gone.
        drop(self.rx.take());
        let pruned = self
            .hub
            .topics
            .remove_if(&self.topic, |_, tx| tx.receiver_count() == 0)
            .is_some();
        if pruned {
            tracing::trace!(topic = %self.topic.key(), "Topic pruned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_common::gateway_event::MessageEventKind;
    use huddle_common::models::{
        Member, MemberRole, MemberWithProfile, Message, MessageScope, MessageWithAuthor,
        ProfileSummary,
    };
    use huddle_common::timestamp;
    use uuid::Uuid;

    fn event(scope: MessageScope, kind: MessageEventKind) -> MessageEvent {
        let now = timestamp::now();
        let member = Member {
            id: Uuid::now_v7(),
            server_id: Uuid::now_v7(),
            profile_id: Uuid::now_v7(),
            role: MemberRole::Guest,
            created_at: now,
            updated_at: now,
        };
        let profile = ProfileSummary {
            id: member.profile_id,
            name: "ada".into(),
            image_url: None,
        };
        let message = Message {
            id: Uuid::now_v7(),
            scope,
            author_id: member.id,
            content: Some("hi".into()),
            attachment: None,
            deleted: false,
            edited: false,
            created_at: now,
            updated_at: now,
        };
        MessageEvent::new(
            kind,
            MessageWithAuthor {
                message,
                author: MemberWithProfile { member, profile },
            },
        )
    }

    #[tokio::test]
    async fn subscribers_receive_events_for_their_topic_only() {
        let hub = BroadcastHub::new(16);
        let a = MessageScope::Channel(Uuid::now_v7());
        let b = MessageScope::Channel(Uuid::now_v7());

        let mut sub_a = hub.subscribe(a.into());
        let mut sub_b = hub.subscribe(b.into());

        assert_eq!(hub.publish(event(a, MessageEventKind::Created)), 1);

        let got = sub_a.recv().await.unwrap();
        assert_eq!(got.kind, MessageEventKind::Created);
        assert!(sub_b.try_recv().is_none());
    }

    #[tokio::test]
    async fn publish_without_subscribers_reaches_nobody() {
        let hub = BroadcastHub::new(16);
        let scope = MessageScope::Conversation(Uuid::now_v7());
        assert_eq!(hub.publish(event(scope, MessageEventKind::Deleted)), 0);
        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn no_replay_for_late_subscribers() {
        let hub = BroadcastHub::new(16);
        let scope = MessageScope::Channel(Uuid::now_v7());
        let _early = hub.subscribe(scope.into());

        hub.publish(event(scope, MessageEventKind::Created));
        let mut late = hub.subscribe(scope.into());
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn dropping_last_subscriber_prunes_topic() {
        let hub = BroadcastHub::new(16);
        let topic: Topic = MessageScope::Channel(Uuid::now_v7()).into();

        let first = hub.subscribe(topic);
        let second = hub.subscribe(topic);
        assert_eq!(hub.subscriber_count(&topic), 2);

        drop(first);
        assert_eq!(hub.subscriber_count(&topic), 1);
        assert_eq!(hub.topic_count(), 1);

        drop(second);
        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_overflow() {
        let hub = BroadcastHub::new(2);
        let scope = MessageScope::Channel(Uuid::now_v7());
        let mut sub = hub.subscribe(scope.into());

        for _ in 0..5 {
            hub.publish(event(scope, MessageEventKind::Created));
        }

        let mut received = 0;
        while sub.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn concurrent_subscribe_and_drop_leave_no_entries() {
        let hub = BroadcastHub::new(16);
        let topic: Topic = MessageScope::Channel(Uuid::now_v7()).into();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let hub = hub.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        let sub = hub.subscribe(topic);
                        tokio::task::yield_now().await;
                        drop(sub);
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(hub.topic_count(), 0);
    }

    #[test]
    fn global_hub_is_a_single_instance() {
        let a = global() as *const BroadcastHub;
        let b = init_global(8) as *const BroadcastHub;
        assert_eq!(a, b);
    }
}
