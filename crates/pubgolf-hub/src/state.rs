use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

const TOPIC_CAPACITY: usize = 256;

type Topics = HashMap<String, broadcast::Sender<String>>;

/// Every topic with at least one subscriber, shared by all connections.
#[derive(Clone, Debug, Default)]
pub struct HubState {
    topics: Arc<Mutex<Topics>>,
}

impl HubState {
    /// Join `topic`, creating it if this is its first subscriber.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let receiver = self
            .topics()
            .entry(topic.to_owned())
            .or_insert_with(|| {
                tracing::info!(topic, "Topic opened");
                broadcast::channel(TOPIC_CAPACITY).0
            })
            .subscribe();

        Subscription {
            state: self.clone(),
            topic: topic.to_owned(),
            receiver,
        }
    }

    /// Deliver `payload` to every current subscriber of `topic`, the publisher included.
    /// Returns how many subscribers it reached.
    pub fn publish(&self, topic: &str, payload: String) -> usize {
        self.topics()
            .get(topic)
            .and_then(|sender| sender.send(payload).ok())
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn topic_count(&self) -> usize {
        self.topics().len()
    }

    fn topics(&self) -> MutexGuard<Topics> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live subscription to one topic. The topic is removed once its last subscription drops.
#[derive(Debug)]
pub struct Subscription {
    state: HubState,
    topic: String,
    receiver: broadcast::Receiver<String>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn receiver(&mut self) -> &mut broadcast::Receiver<String> {
        &mut self.receiver
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut topics = self.state.topics();
        // Our own receiver is still alive at this point
        let last = topics
            .get(&self.topic)
            .map_or(false, |sender| sender.receiver_count() <= 1);
        if last {
            topics.remove(&self.topic);
            tracing::info!(topic = %self.topic, "Topic closed");
        }
    }
}
