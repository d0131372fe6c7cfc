//! In-Process Relay
//!
//! A [`RealtimeChannel`] backed by one tokio broadcast channel per topic.
//! Used by tests and the headless runner. Like a real relay it fans each
//! message out to every subscriber, including the sender.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::network::channel::{ChannelLink, RealtimeChannel, TransportError, LINK_CAPACITY};
use crate::network::protocol::PlayerPosition;

/// Per-topic fan-out buffer.
const TOPIC_CAPACITY: usize = 256;

/// Shared in-process hub. Clones share topics.
#[derive(Clone, Default)]
pub struct MemoryHub {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<PlayerPosition>>>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn topic_sender(&self, topic: &str) -> Result<broadcast::Sender<PlayerPosition>, TransportError> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| TransportError::Connect("hub lock poisoned".to_string()))?;
        Ok(topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone())
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .ok()
            .and_then(|topics| topics.get(topic).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    /// Inject a message as if a remote peer had sent it.
    pub fn inject(&self, topic: &str, position: PlayerPosition) -> Result<(), TransportError> {
        self.topic_sender(topic)?
            .send(position)
            .map(|_| ())
            .map_err(|_| TransportError::Send("no subscribers".to_string()))
    }
}

impl RealtimeChannel for MemoryHub {
    async fn open(&self, topic: &str) -> Result<ChannelLink, TransportError> {
        let fanout = self.topic_sender(topic)?;
        let mut subscription = fanout.subscribe();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<PlayerPosition>(LINK_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<PlayerPosition>(LINK_CAPACITY);

        // Writer: local queue -> topic
        let writer = tokio::spawn(async move {
            while let Some(position) = outbound_rx.recv().await {
                // No receivers is not an error for a best-effort channel
                let _ = fanout.send(position);
            }
        });

        // Reader: topic -> local queue
        let topic_name = topic.to_string();
        let reader = tokio::spawn(async move {
            loop {
                match subscription.recv().await {
                    Ok(position) => {
                        if inbound_tx.try_send(position).is_err() {
                            debug!(topic = %topic_name, "Inbound queue full, dropping position");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic_name, skipped, "Subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        debug!(topic, "Memory channel opened");
        Ok(ChannelLink::new(outbound_tx, inbound_rx, vec![writer, reader]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn position(id: &str, distance: f64) -> PlayerPosition {
        PlayerPosition {
            session_id: id.to_string(),
            player_name: id.to_string(),
            distance_m: distance,
            vertical_position: 300.0,
            alive: true,
            current_score: 0,
        }
    }

    async fn recv(link: &mut ChannelLink) -> Option<PlayerPosition> {
        for _ in 0..100 {
            if let Ok(Some(p)) = link.try_recv() {
                return Some(p);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_fan_out_includes_sender() {
        let hub = MemoryHub::new();
        let mut a = hub.open("t").await.expect("open");
        let mut b = hub.open("t").await.expect("open");
        assert_eq!(hub.subscriber_count("t"), 2);

        a.outbound().send(position("a", 1.0)).await.expect("queued");

        assert_eq!(recv(&mut b).await.map(|p| p.session_id), Some("a".to_string()));
        assert_eq!(recv(&mut a).await.map(|p| p.session_id), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let hub = MemoryHub::new();
        let a = hub.open("match:1:positions").await.expect("open");
        let mut b = hub.open("match:2:positions").await.expect("open");

        a.outbound().send(position("a", 1.0)).await.expect("queued");
        assert!(recv(&mut b).await.is_none());
    }

    #[tokio::test]
    async fn test_closed_link_unsubscribes() {
        let hub = MemoryHub::new();
        let mut a = hub.open("t").await.expect("open");
        a.close();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(hub.subscriber_count("t"), 0);
    }

    #[tokio::test]
    async fn test_inject() {
        let hub = MemoryHub::new();
        let mut a = hub.open("t").await.expect("open");
        hub.inject("t", position("ghost", 5.0)).expect("delivered");
        assert_eq!(recv(&mut a).await.map(|p| p.distance_m), Some(5.0));
    }
}
