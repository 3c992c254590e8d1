use pubgolf_lib::net::{Envelope, Message};
use pubgolf_lib::{GameCode, PlayerId};
use tokio::sync::mpsc;

use super::channel_actor::ChannelCommand;
use super::{ChannelError, ChannelResult, Role};

#[derive(Debug)]
pub struct SyncChannel {
    pub(super) sender: mpsc::UnboundedSender<ChannelCommand>,
    pub(super) role: Role,
    pub(super) game_code: GameCode,
    pub(super) peer_id: PlayerId,
    pub(super) max_message_bytes: usize,
}

impl SyncChannel {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn game_code(&self) -> &GameCode {
        &self.game_code
    }

    /// This endpoint's identity, stamped on every envelope it sends.
    pub fn peer_id(&self) -> &PlayerId {
        &self.peer_id
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queue a message for broadcast. Returns as soon as the message is queued.
    ///
    /// # Errors
    ///
    /// Oversized messages are dropped here, before they reach the queue, and reported as
    /// [`ChannelError::MessageTooLarge`]. A torn down channel reports
    /// [`ChannelError::HandleInvalid`].
    pub fn send(&self, message: Message) -> ChannelResult<()> {
        let kind = message.kind();
        let envelope = Envelope {
            data: message,
            sender_id: self.peer_id.clone(),
        };
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| ChannelError::Serialization(e.to_string()))?;

        if payload.len() > self.max_message_bytes {
            tracing::warn!(
                kind,
                size = payload.len(),
                max = self.max_message_bytes,
                "Dropping oversized message"
            );
            return Err(ChannelError::MessageTooLarge {
                size: payload.len(),
                max: self.max_message_bytes,
            });
        }

        self.sender
            .send(ChannelCommand::Publish { kind, payload })
            .map_err(|_| ChannelError::HandleInvalid)
    }

    /// Tear down immediately. Anything still queued is dropped. Safe to call repeatedly.
    pub fn disconnect(&self) {
        let _ = self.sender.send(ChannelCommand::Disconnect);
    }

    /// Tear down once everything queued so far has been published.
    pub fn finish(&self) {
        let _ = self.sender.send(ChannelCommand::Finish);
    }
}

#[cfg(test)]
mod test {
    use pubgolf_lib::net::Message;
    use tokio::sync::mpsc;

    use super::SyncChannel;
    use crate::channel::channel_actor::ChannelCommand;
    use crate::channel::{ChannelError, Role};

    fn setup() -> (mpsc::UnboundedReceiver<ChannelCommand>, SyncChannel) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SyncChannel {
            sender: tx,
            role: Role::Client,
            game_code: "ABC123".into(),
            peer_id: "me".into(),
            max_message_bytes: 200,
        };
        (rx, handle)
    }

    #[tokio::test]
    async fn send_queues_envelope() {
        let (mut rx, handle) = setup();
        handle
            .send(Message::LeaveGame {
                player_id: "me".into(),
            })
            .unwrap();

        let Some(ChannelCommand::Publish { kind, payload }) = rx.recv().await else {
            panic!("Incorrect ChannelCommand produced");
        };
        assert_eq!(kind, "LEAVE_GAME");
        assert_eq!(
            payload,
            r#"{"data":{"type":"LEAVE_GAME","playerId":"me"},"senderId":"me"}"#
        );
    }

    #[tokio::test]
    async fn oversized_message_never_queued() {
        let (mut rx, handle) = setup();
        let result = handle.send(Message::JoinGame {
            player_name: Some("x".repeat(500)),
        });
        assert!(matches!(
            result,
            Err(ChannelError::MessageTooLarge { max: 200, .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (mut rx, handle) = setup();
        handle.disconnect();
        handle.disconnect();
        assert!(matches!(rx.recv().await, Some(ChannelCommand::Disconnect)));

        drop(rx);
        // Nothing left to receive, further calls are still harmless
        handle.disconnect();
        assert!(handle.is_closed());
        assert_eq!(
            handle.send(Message::EndGame),
            Err(ChannelError::HandleInvalid)
        );
    }
}
