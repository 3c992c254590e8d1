//! The named-topic publish/subscribe boundary that a [`SyncChannel`](crate::channel::SyncChannel)
//! runs on top of.
//!
//! Delivery is at-most-once, unordered across publishers and only happens while subscribed.
//! Two implementations ship with the crate: [`LocalHub`] for peers inside one process and
//! [`TcpTransport`] for peers talking through a `pubgolf-hub` relay.

use async_trait::async_trait;
use pubgolf_lib::net::{FrameError, ProtocolError};
use thiserror::Error;

pub use local::{LocalHub, LocalTransport, Publication};
pub use tcp::{load_hub_address, TcpTransport};

mod local;
mod tcp;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not subscribed to topic '{0}'")]
    NotSubscribed(String),
    #[error("Transport is closed")]
    Closed,
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A previous [`Transport::subscribe`] request was confirmed.
    Subscribed { topic: String },
    Message { topic: String, payload: String },
}

#[async_trait]
pub trait Transport: Send + 'static {
    /// Request a subscription. Confirmation arrives later as [`TransportEvent::Subscribed`] and
    /// may never arrive at all.
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    async fn publish(&mut self, topic: &str, payload: String) -> Result<(), TransportError>;

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Wait for the next event. `None` once the transport has closed for good.
    ///
    /// Must be cancel safe, it is polled inside `select!`.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}
