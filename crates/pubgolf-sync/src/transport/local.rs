use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use abort_on_drop::ChildTask;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use super::{Transport, TransportError, TransportEvent};

const TOPIC_CAPACITY: usize = 256;

/// A record of one payload published through a [`LocalHub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub at: Instant,
}

#[derive(Debug)]
struct HubInner {
    topics: HashMap<String, broadcast::Sender<String>>,
    confirm_subscriptions: bool,
    log: Vec<Publication>,
}

/// An in-process pub/sub hub. Every [`LocalTransport`] made from the same hub (or a clone of it)
/// shares its topics.
#[derive(Clone, Debug)]
pub struct LocalHub {
    inner: Arc<Mutex<HubInner>>,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                topics: HashMap::new(),
                confirm_subscriptions: true,
                log: Vec::new(),
            })),
        }
    }

    pub fn connect(&self) -> LocalTransport {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        LocalTransport {
            hub: self.clone(),
            inbox_tx,
            inbox_rx,
            subscriptions: HashMap::new(),
        }
    }

    /// When disabled, subscriptions still receive traffic but are never confirmed.
    pub fn set_confirm_subscriptions(&self, confirm: bool) {
        self.lock().confirm_subscriptions = confirm;
    }

    /// Everything published on `topic` so far, oldest first.
    pub fn published(&self, topic: &str) -> Vec<Publication> {
        self.lock()
            .log
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct LocalTransport {
    hub: LocalHub,
    inbox_tx: mpsc::UnboundedSender<TransportEvent>,
    inbox_rx: mpsc::UnboundedReceiver<TransportEvent>,
    subscriptions: HashMap<String, ChildTask<()>>,
}

async fn forward_topic(
    topic: String,
    mut topic_rx: broadcast::Receiver<String>,
    inbox: mpsc::UnboundedSender<TransportEvent>,
) {
    loop {
        let payload = match topic_rx.recv().await {
            Ok(p) => p,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(%topic, missed, "Subscriber fell behind, messages were lost");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        let event = TransportEvent::Message {
            topic: topic.clone(),
            payload,
        };
        if inbox.send(event).is_err() {
            return;
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let (topic_rx, confirm) = {
            let mut hub = self.hub.lock();
            let topic_rx = hub
                .topics
                .entry(topic.to_owned())
                .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
                .subscribe();
            (topic_rx, hub.confirm_subscriptions)
        };

        let task = tokio::spawn(forward_topic(
            topic.to_owned(),
            topic_rx,
            self.inbox_tx.clone(),
        ));
        self.subscriptions.insert(topic.to_owned(), task.into());

        if confirm {
            let _ = self.inbox_tx.send(TransportEvent::Subscribed {
                topic: topic.to_owned(),
            });
        }
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: String) -> Result<(), TransportError> {
        if !self.subscriptions.contains_key(topic) {
            return Err(TransportError::NotSubscribed(topic.to_owned()));
        }

        let mut hub = self.hub.lock();
        hub.log.push(Publication {
            topic: topic.to_owned(),
            payload: payload.clone(),
            at: Instant::now(),
        });
        if let Some(sender) = hub.topics.get(topic) {
            // Only fails when nobody is listening, which is not an error for a broadcast.
            let _ = sender.send(payload);
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        // Dropping the forwarding task aborts it
        self.subscriptions.remove(topic);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbox_rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::LocalHub;
    use crate::transport::{Transport, TransportError, TransportEvent};

    #[tokio::test]
    async fn subscribers_share_topics() {
        let hub = LocalHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();
        a.subscribe("t").await.unwrap();
        b.subscribe("t").await.unwrap();

        assert_eq!(
            a.next_event().await,
            Some(TransportEvent::Subscribed {
                topic: "t".to_owned()
            })
        );
        assert_eq!(
            b.next_event().await,
            Some(TransportEvent::Subscribed {
                topic: "t".to_owned()
            })
        );

        a.publish("t", "hello".to_owned()).await.unwrap();
        // The publisher hears itself as well
        for t in [&mut a, &mut b] {
            let ev = timeout(Duration::from_secs(1), t.next_event()).await.unwrap();
            assert_eq!(
                ev,
                Some(TransportEvent::Message {
                    topic: "t".to_owned(),
                    payload: "hello".to_owned()
                })
            );
        }
        assert_eq!(hub.published("t").len(), 1);
    }

    #[tokio::test]
    async fn publish_requires_subscription() {
        let hub = LocalHub::new();
        let mut a = hub.connect();
        assert!(matches!(
            a.publish("t", "x".to_owned()).await,
            Err(TransportError::NotSubscribed(_))
        ));
        assert!(hub.published("t").is_empty());
    }

    #[tokio::test]
    async fn unconfirmed_subscription() {
        let hub = LocalHub::new();
        hub.set_confirm_subscriptions(false);
        let mut a = hub.connect();
        a.subscribe("t").await.unwrap();
        timeout(Duration::from_millis(50), a.next_event())
            .await
            .expect_err("No confirmation should arrive");
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let hub = LocalHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();
        a.subscribe("t").await.unwrap();
        b.subscribe("t").await.unwrap();
        let _ = b.next_event().await;
        b.unsubscribe("t").await.unwrap();

        a.publish("t", "x".to_owned()).await.unwrap();
        timeout(Duration::from_millis(50), b.next_event())
            .await
            .expect_err("Unsubscribed transport still received a message");
    }
}
