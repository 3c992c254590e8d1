use async_trait::async_trait;
use pubgolf_lib::net::connection::{self, ConnectionRx, ConnectionTx};
use pubgolf_lib::net::{HubFrame, ProtocolError};
use tokio::net::{TcpStream, ToSocketAddrs};

use super::{Transport, TransportError, TransportEvent};

pub const DEFAULT_HUB_ADDRESS: &str = "127.0.0.1:42933";

/// A connection to a `pubgolf-hub` relay.
#[derive(Debug)]
pub struct TcpTransport {
    conn_tx: ConnectionTx,
    conn_rx: ConnectionRx,
}

impl TcpTransport {
    /// Connect and complete the version handshake.
    ///
    /// # Errors
    ///
    /// Fails when the hub is unreachable, rejects our protocol version or hangs up mid-handshake.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let sock = TcpStream::connect(addr).await?;
        let (mut conn_tx, mut conn_rx) = connection::from_socket(sock);
        conn_tx
            .write_frame(&HubFrame::Version {
                version: pubgolf_lib::VERSION.to_owned(),
            })
            .await?;

        match conn_rx.read_frame().await? {
            Some(HubFrame::Accept) => {
                tracing::info!("Connected to hub");
                Ok(Self { conn_tx, conn_rx })
            }
            Some(HubFrame::Error { error }) => Err(error.into()),
            Some(_) => Err(ProtocolError::InvalidMessage.into()),
            None => Err(ProtocolError::Disconnected.into()),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let frame = HubFrame::Subscribe {
            topic: topic.to_owned(),
        };
        Ok(self.conn_tx.write_frame(&frame).await?)
    }

    async fn publish(&mut self, topic: &str, payload: String) -> Result<(), TransportError> {
        let frame = HubFrame::Publish {
            topic: topic.to_owned(),
            payload,
        };
        Ok(self.conn_tx.write_frame(&frame).await?)
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let frame = HubFrame::Unsubscribe {
            topic: topic.to_owned(),
        };
        Ok(self.conn_tx.write_frame(&frame).await?)
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            let frame = match self.conn_rx.read_frame().await {
                Ok(Some(f)) => f,
                Ok(None) => {
                    tracing::info!("Hub closed connection.");
                    return None;
                }
                Err(e) => {
                    tracing::error!("Error reading frame from hub. Disconnecting.\n{e}");
                    return None;
                }
            };

            match frame {
                HubFrame::Subscribed { topic } => return Some(TransportEvent::Subscribed { topic }),
                HubFrame::Deliver { topic, payload } => {
                    return Some(TransportEvent::Message { topic, payload })
                }
                HubFrame::Error { error } => {
                    tracing::error!("Error from hub:\n{error}");
                }
                f => {
                    tracing::warn!("Unexpected frame from hub: {f:?}");
                }
            }
        }
    }
}

/// Where to find the hub: `PUBGOLF_HUB`, then a `hubaddress` file next to the executable,
/// then [`DEFAULT_HUB_ADDRESS`].
pub fn load_hub_address() -> String {
    if let Ok(addr) = std::env::var("PUBGOLF_HUB") {
        let addr = addr.trim();
        if !addr.is_empty() {
            return addr.to_owned();
        }
    }

    if let Ok(mut exe_path) = std::env::current_exe() {
        exe_path.pop();
        exe_path.push("hubaddress");
        if let Ok(addr) = std::fs::read_to_string(exe_path) {
            return addr.trim().to_string();
        }
    }

    DEFAULT_HUB_ADDRESS.into()
}
