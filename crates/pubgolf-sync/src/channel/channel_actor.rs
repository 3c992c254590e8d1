use std::collections::VecDeque;

use pubgolf_lib::net::Envelope;
use pubgolf_lib::{GameCode, PlayerId};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::instrument;

use crate::config::SyncConfig;
use crate::transport::{Transport, TransportEvent};

use super::{ChannelEvent, CloseReason, Role, SenderContext};

#[derive(Debug)]
pub(super) enum ChannelCommand {
    Publish { kind: &'static str, payload: String },
    Finish,
    Disconnect,
}

#[derive(Debug)]
struct Outgoing {
    kind: &'static str,
    payload: String,
}

pub(super) struct ChannelActor<T> {
    transport: T,
    receiver: mpsc::UnboundedReceiver<ChannelCommand>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    config: SyncConfig,
    role: Role,
    game_code: GameCode,
    topic: String,
    peer_id: PlayerId,
    // Unbounded: messages are delayed under backpressure, never dropped.
    queue: VecDeque<Outgoing>,
    subscribed: bool,
    finishing: bool,
    handles_gone: bool,
    next_send_at: Instant,
    last_activity: Instant,
}

impl<T: Transport> ChannelActor<T> {
    pub fn new(
        transport: T,
        receiver: mpsc::UnboundedReceiver<ChannelCommand>,
        events: mpsc::UnboundedSender<ChannelEvent>,
        config: SyncConfig,
        role: Role,
        game_code: GameCode,
        peer_id: PlayerId,
    ) -> Self {
        let now = Instant::now();
        Self {
            transport,
            receiver,
            events,
            config,
            role,
            topic: game_code.topic(),
            game_code,
            peer_id,
            queue: VecDeque::new(),
            subscribed: false,
            finishing: false,
            handles_gone: false,
            next_send_at: now,
            last_activity: now,
        }
    }

    #[instrument(skip_all, fields(game_code = %self.game_code, role = ?self.role, peer_id = %self.peer_id))]
    pub async fn run(mut self) {
        if let Err(e) = self.transport.subscribe(&self.topic).await {
            // Stay unsubscribed. The owner sees a channel that never finishes connecting.
            tracing::error!(%e, "Failed to subscribe");
        }

        let mut liveness = time::interval(self.config.liveness_tick);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            let ready_to_send = self.subscribed && !self.queue.is_empty();
            tokio::select! {
                cmd = self.receiver.recv(), if !self.handles_gone => match cmd {
                    Some(ChannelCommand::Publish { kind, .. }) if self.finishing => {
                        tracing::warn!(kind, "Channel is finishing, dropping message");
                    }
                    Some(ChannelCommand::Publish { kind, payload }) => self.enqueue(kind, payload),
                    Some(ChannelCommand::Finish) => {
                        if self.queue.is_empty() || !self.subscribed {
                            break CloseReason::Finished;
                        }
                        self.finishing = true;
                    }
                    Some(ChannelCommand::Disconnect) => break CloseReason::Disconnected,
                    // Every handle dropped after finish(), keep draining
                    None if self.finishing => self.handles_gone = true,
                    None => break CloseReason::Disconnected,
                },
                event = self.transport.next_event() => match event {
                    Some(event) => self.handle_transport_event(event),
                    None => break CloseReason::TransportClosed,
                },
                _ = time::sleep_until(self.next_send_at), if ready_to_send => {
                    self.publish_next().await;
                    if self.finishing && self.queue.is_empty() {
                        break CloseReason::Finished;
                    }
                }
                _ = liveness.tick() => {
                    if self.last_activity.elapsed() >= self.config.inactivity_timeout {
                        tracing::info!("No traffic for {:?}, closing", self.config.inactivity_timeout);
                        break CloseReason::Inactivity;
                    }
                }
            }
        };

        self.teardown(reason).await;
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn emit(&self, event: ChannelEvent) {
        // The owner may already have walked away, that's fine.
        let _ = self.events.send(event);
    }

    fn enqueue(&mut self, kind: &'static str, payload: String) {
        tracing::debug!(kind, queued = self.queue.len(), "Queueing message");
        self.queue.push_back(Outgoing { kind, payload });
        self.touch();
    }

    async fn publish_next(&mut self) {
        let Some(msg) = self.queue.pop_front() else {
            return;
        };

        match self.transport.publish(&self.topic, msg.payload).await {
            Ok(()) => tracing::debug!(kind = msg.kind, "Published message"),
            Err(e) => tracing::error!(kind = msg.kind, %e, "Failed to publish message"),
        }
        self.next_send_at = Instant::now() + self.config.send_interval;
        self.touch();
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Subscribed { topic } if topic == self.topic => {
                if self.subscribed {
                    return;
                }
                self.subscribed = true;
                self.touch();
                tracing::info!("Subscribed to {topic}");
                self.emit(ChannelEvent::Subscribed {
                    game_code: self.game_code.clone(),
                });
            }
            TransportEvent::Message { topic, payload } if topic == self.topic => {
                self.touch();
                let envelope = match serde_json::from_str::<Envelope>(&payload) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(%e, "Dropping undecodable message");
                        return;
                    }
                };
                if envelope.sender_id == self.peer_id && !self.config.self_delivery {
                    return;
                }
                tracing::debug!(
                    kind = envelope.data.kind(),
                    sender = %envelope.sender_id,
                    "Received message"
                );
                self.emit(ChannelEvent::Message {
                    message: envelope.data,
                    sender: SenderContext {
                        sender_id: envelope.sender_id,
                    },
                });
            }
            TransportEvent::Subscribed { topic } | TransportEvent::Message { topic, .. } => {
                tracing::debug!("Ignoring traffic on foreign topic {topic}");
            }
        }
    }

    async fn teardown(mut self, reason: CloseReason) {
        self.receiver.close();
        if !self.queue.is_empty() {
            tracing::warn!(dropped = self.queue.len(), "Dropping unsent messages");
            self.queue.clear();
        }
        if reason != CloseReason::TransportClosed {
            if let Err(e) = self.transport.unsubscribe(&self.topic).await {
                tracing::warn!(%e, "Failed to unsubscribe");
            }
        }
        tracing::info!(?reason, "Channel closed");
        self.emit(ChannelEvent::Closed { reason });
    }
}
