use std::collections::HashMap;

use abort_on_drop::ChildTask;
use anyhow::Context;
use pubgolf_lib::net::connection::{self, ConnectionRx, ConnectionTx};
use pubgolf_lib::net::{HubFrame, ProtocolError};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tracing::instrument;

use crate::state::{HubState, Subscription};

/// Take a socket for a newly connected peer and begin serving it.
pub async fn handle_new_connection(state: HubState, socket: TcpStream) {
    let peer = socket
        .peer_addr()
        .map_or_else(|_| "unknown".to_owned(), |a| a.to_string());
    let (conn_tx, conn_rx) = connection::from_socket(socket);
    let client = match ConnectingClient::new(state, conn_tx, conn_rx).handshake().await {
        Some(c) => c,
        None => return,
    };
    if let Err(e) = client.run(peer).await {
        tracing::error!("Connection closed with error: {e:#}");
    }
}

/// A peer that still has to prove it speaks our protocol version.
struct ConnectingClient {
    state: HubState,
    conn_tx: ConnectionTx,
    conn_rx: ConnectionRx,
}

impl ConnectingClient {
    fn new(state: HubState, conn_tx: ConnectionTx, conn_rx: ConnectionRx) -> Self {
        Self {
            state,
            conn_tx,
            conn_rx,
        }
    }

    async fn handshake(mut self) -> Option<ConnectedClient> {
        match self.try_handshake().await {
            Ok(()) => Some(ConnectedClient::from_connecting(self)),
            Err(error) => {
                tracing::error!(%error, "Handshake failed");
                let _ = self.conn_tx.write_frame(&HubFrame::Error { error }).await;
                None
            }
        }
    }

    async fn try_handshake(&mut self) -> Result<(), ProtocolError> {
        let version = match self.conn_rx.read_frame().await? {
            Some(HubFrame::Version { version }) => version,
            Some(_) => return Err(ProtocolError::InvalidMessage),
            None => return Err(ProtocolError::Disconnected),
        };

        if version != pubgolf_lib::VERSION {
            return Err(ProtocolError::VersionMismatch(
                version,
                pubgolf_lib::VERSION.to_owned(),
            ));
        }

        self.conn_tx.write_frame(&HubFrame::Accept).await?;
        Ok(())
    }
}

async fn send_task(mut conn_tx: ConnectionTx, mut local_rx: mpsc::Receiver<HubFrame>) {
    while let Some(frame) = local_rx.recv().await {
        if conn_tx.write_frame(&frame).await.is_err() {
            return;
        }
    }
}

async fn forward_task(mut subscription: Subscription, local_tx: mpsc::Sender<HubFrame>) {
    loop {
        let payload = match subscription.receiver().recv().await {
            Ok(p) => p,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(topic = subscription.topic(), missed, "Subscriber lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        let frame = HubFrame::Deliver {
            topic: subscription.topic().to_owned(),
            payload,
        };
        if local_tx.send(frame).await.is_err() {
            return;
        }
    }
}

/// A peer that passed the handshake. Subscriptions end when it disconnects.
struct ConnectedClient {
    state: HubState,
    conn_rx: ConnectionRx,
    local_tx: mpsc::Sender<HubFrame>,
    // Dropping a forwarder aborts it and releases its subscription
    subscriptions: HashMap<String, ChildTask<()>>,
    _send_task: ChildTask<()>,
}

impl ConnectedClient {
    fn from_connecting(client: ConnectingClient) -> Self {
        let (local_tx, local_rx) = mpsc::channel(64);
        let send_task = tokio::spawn(send_task(client.conn_tx, local_rx));

        Self {
            state: client.state,
            conn_rx: client.conn_rx,
            local_tx,
            subscriptions: HashMap::new(),
            _send_task: send_task.into(),
        }
    }

    /// Takes ownership of self so every subscription is released when the loop ends.
    #[instrument(skip(self))]
    async fn run(mut self, peer: String) -> anyhow::Result<()> {
        tracing::info!("Peer connected");
        loop {
            let Some(frame) = self
                .conn_rx
                .read_frame()
                .await
                .context("Error reading frame")?
            else {
                break;
            };
            tracing::debug!("Received frame: {frame:?}");
            match frame {
                HubFrame::Subscribe { topic } => self.subscribe(topic).await?,
                HubFrame::Unsubscribe { topic } => {
                    self.subscriptions.remove(&topic);
                }
                HubFrame::Publish { topic, payload } => self.publish(topic, payload).await?,
                f => {
                    tracing::error!("Invalid frame received: {f:?}");
                    self.reply(HubFrame::Error {
                        error: ProtocolError::InvalidMessage,
                    })
                    .await?;
                }
            }
        }
        tracing::info!("Peer disconnected");
        Ok(())
    }

    async fn reply(&self, frame: HubFrame) -> anyhow::Result<()> {
        self.local_tx
            .send(frame)
            .await
            .context("Send task has stopped")
    }

    async fn subscribe(&mut self, topic: String) -> anyhow::Result<()> {
        if !self.subscriptions.contains_key(&topic) {
            let subscription = self.state.subscribe(&topic);
            let task = tokio::spawn(forward_task(subscription, self.local_tx.clone()));
            self.subscriptions.insert(topic.clone(), task.into());
        }
        self.reply(HubFrame::Subscribed { topic }).await
    }

    async fn publish(&mut self, topic: String, payload: String) -> anyhow::Result<()> {
        if !self.subscriptions.contains_key(&topic) {
            tracing::warn!(%topic, "Publish on a topic without a subscription");
            return self
                .reply(HubFrame::Error {
                    error: ProtocolError::NotSubscribed(topic),
                })
                .await;
        }
        let reached = self.state.publish(&topic, payload);
        tracing::debug!(%topic, reached, "Published");
        Ok(())
    }
}
