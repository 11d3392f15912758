//! Broadcast fanout.
//!
//! One-to-many delivery of push events to every registered connection.
//! There is no per-connection acknowledgment or retry: a connection whose
//! write fails, or fails to complete within the push deadline, is stale
//! and reported back to the caller for deregistration.

use std::collections::HashMap;
use std::time::Duration;

use gavel_core::ConnectionId;
use gavel_proto::PushEvent;

/// A connection that cannot absorb a push within this window is stale.
///
/// The deadline keeps delivery bounded while the driver lock is held: a
/// peer that stops reading exhausts its flow-control credit and would
/// otherwise park the whole driver on one write.
const PUSH_DEADLINE: Duration = Duration::from_secs(5);

/// A per-connection push channel.
///
/// `push` returns whether the write succeeded; a `false` marks the
/// connection stale.
pub trait PushChannel: Send + Sync {
    /// Deliver one encoded message, fire-and-forget.
    fn push(&self, payload: &[u8]) -> impl std::future::Future<Output = bool> + Send;
}

/// Registry of live push channels with fanout delivery.
///
/// Every connection registered at the start of a `publish` or `relay` call
/// either receives the message or ends up in the returned stale list; there
/// are no partial silent drops for live connections.
#[derive(Debug)]
pub struct Fanout<C> {
    channels: HashMap<ConnectionId, C>,
}

impl<C: PushChannel> Fanout<C> {
    /// Create an empty fanout.
    pub fn new() -> Self {
        Self { channels: HashMap::new() }
    }

    /// Register a connection's push channel.
    pub fn insert(&mut self, conn_id: ConnectionId, channel: C) {
        self.channels.insert(conn_id, channel);
    }

    /// Remove a connection's push channel. Idempotent.
    pub fn remove(&mut self, conn_id: ConnectionId) {
        self.channels.remove(&conn_id);
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channels are registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver an event to every registered connection.
    ///
    /// Returns the ids whose writes failed or timed out so the caller can
    /// deregister them.
    pub async fn publish(&self, event: &PushEvent) -> Vec<ConnectionId> {
        let payload = event.encode();
        let mut stale = Vec::new();

        for (conn_id, channel) in &self.channels {
            if !push_with_deadline(channel, payload.as_bytes()).await {
                stale.push(*conn_id);
            }
        }

        stale
    }

    /// Deliver an event to a single connection.
    ///
    /// Returns the id back if the write failed or timed out.
    pub async fn send_to(&self, conn_id: ConnectionId, event: &PushEvent) -> Option<ConnectionId> {
        let channel = self.channels.get(&conn_id)?;
        if push_with_deadline(channel, event.encode().as_bytes()).await {
            None
        } else {
            Some(conn_id)
        }
    }
}

impl<C: PushChannel> Default for Fanout<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one push under the deadline; an elapsed deadline is a failed push.
async fn push_with_deadline<C: PushChannel>(channel: &C, payload: &[u8]) -> bool {
    tokio::time::timeout(PUSH_DEADLINE, channel.push(payload)).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use gavel_proto::AuctionItem;

    use super::*;

    /// Records pushed payloads; configurable to fail or stall forever.
    struct MockChannel {
        delivered: Mutex<Vec<String>>,
        healthy: bool,
        stalled: bool,
    }

    impl MockChannel {
        fn healthy() -> Self {
            Self { delivered: Mutex::new(Vec::new()), healthy: true, stalled: false }
        }

        fn broken() -> Self {
            Self { delivered: Mutex::new(Vec::new()), healthy: false, stalled: false }
        }

        fn stalled() -> Self {
            Self { delivered: Mutex::new(Vec::new()), healthy: true, stalled: true }
        }

        fn received(&self) -> usize {
            self.delivered.lock().map(|v| v.len()).unwrap_or(0)
        }
    }

    impl PushChannel for MockChannel {
        async fn push(&self, payload: &[u8]) -> bool {
            if self.stalled {
                std::future::pending::<()>().await;
            }
            if !self.healthy {
                return false;
            }
            if let Ok(mut delivered) = self.delivered.lock() {
                delivered.push(String::from_utf8_lossy(payload).into_owned());
            }
            true
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_registered_channel() {
        let mut fanout = Fanout::new();
        fanout.insert(1, MockChannel::healthy());
        fanout.insert(2, MockChannel::healthy());

        let stale = fanout.publish(&PushEvent::CurrentItem(AuctionItem::seed())).await;

        assert!(stale.is_empty());
        for channel in fanout.channels.values() {
            assert_eq!(channel.received(), 1);
        }
    }

    #[tokio::test]
    async fn stale_channel_is_reported_not_retried() {
        let mut fanout = Fanout::new();
        fanout.insert(1, MockChannel::healthy());
        fanout.insert(2, MockChannel::broken());

        let stale = fanout.publish(&PushEvent::Message("x".to_string())).await;

        assert_eq!(stale, vec![2]);

        fanout.remove(2);
        assert_eq!(fanout.len(), 1);
        let stale = fanout.publish(&PushEvent::Message("y".to_string())).await;
        assert!(stale.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_channel_is_reported_after_the_deadline() {
        let mut fanout = Fanout::new();
        fanout.insert(1, MockChannel::healthy());
        fanout.insert(2, MockChannel::stalled());

        // A write that never completes must not park delivery forever: the
        // deadline elapses and the connection is reported stale.
        let stale = fanout.publish(&PushEvent::Message("x".to_string())).await;

        assert_eq!(stale, vec![2]);
        assert_eq!(fanout.channels[&1].received(), 1);

        let stale = fanout.send_to(2, &PushEvent::Message("y".to_string())).await;
        assert_eq!(stale, Some(2));
    }

    #[tokio::test]
    async fn send_to_targets_a_single_connection() {
        let mut fanout = Fanout::new();
        fanout.insert(1, MockChannel::healthy());
        fanout.insert(2, MockChannel::healthy());

        let stale = fanout.send_to(1, &PushEvent::Error("too low".to_string())).await;

        assert!(stale.is_none());
        assert_eq!(fanout.channels[&1].received(), 1);
        assert_eq!(fanout.channels[&2].received(), 0);
    }

    #[tokio::test]
    async fn send_to_unknown_connection_is_noop() {
        let fanout: Fanout<MockChannel> = Fanout::new();
        let stale = fanout.send_to(9, &PushEvent::Error("gone".to_string())).await;
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let mut fanout = Fanout::new();
        fanout.insert(1, MockChannel::healthy());
        fanout.remove(1);
        fanout.remove(1);
        assert!(fanout.is_empty());
    }
}
