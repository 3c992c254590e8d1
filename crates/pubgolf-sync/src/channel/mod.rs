//! A rate-limited, size-bounded broadcast channel for one game.
//!
//! Each channel is an actor task that owns its [`Transport`]. Callers talk to it through a
//! [`SyncChannel`] handle and observe it through a stream of [`ChannelEvent`]s.

use pubgolf_lib::net::Message;
use pubgolf_lib::{generate_game_code, generate_player_id, GameCode, PlayerId};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::SyncConfig;
use crate::transport::Transport;

use self::channel_actor::ChannelActor;
pub use self::channel_handle::SyncChannel;

mod channel_actor;
mod channel_handle;

pub type ChannelEvents = mpsc::UnboundedReceiver<ChannelEvent>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },
    #[error("Failed to serialize message: {0}")]
    Serialization(String),
    #[error("The channel has been torn down.")]
    HandleInvalid,
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Who published an inbound message. Replies are broadcasts that name this identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SenderContext {
    pub sender_id: PlayerId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// [`SyncChannel::disconnect`] was called or every handle was dropped.
    Disconnected,
    /// [`SyncChannel::finish`] was called and the queue has drained.
    Finished,
    /// No traffic for the configured inactivity window.
    Inactivity,
    /// The transport went away underneath us.
    TransportClosed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    Subscribed { game_code: GameCode },
    Message { message: Message, sender: SenderContext },
    Closed { reason: CloseReason },
}

/// Host a brand new game under a freshly allocated code.
pub fn init_host(
    transport: impl Transport,
    config: SyncConfig,
) -> (SyncChannel, ChannelEvents, GameCode) {
    let game_code = generate_game_code();
    let (channel, events) = open_host(transport, config, game_code.clone());
    (channel, events, game_code)
}

/// Host under a code that already exists, e.g. when resuming after a restart.
pub fn open_host(
    transport: impl Transport,
    config: SyncConfig,
    game_code: GameCode,
) -> (SyncChannel, ChannelEvents) {
    start_channel(transport, config, Role::Host, game_code)
}

/// Listen in on an existing game. Returns this endpoint's identity on the channel.
///
/// Nothing checks that a host is actually present; without one, no messages ever arrive.
pub fn init_client(
    transport: impl Transport,
    config: SyncConfig,
    game_code: GameCode,
) -> (SyncChannel, ChannelEvents, PlayerId) {
    let (channel, events) = start_channel(transport, config, Role::Client, game_code);
    let peer_id = channel.peer_id().clone();
    (channel, events, peer_id)
}

fn start_channel(
    transport: impl Transport,
    config: SyncConfig,
    role: Role,
    game_code: GameCode,
) -> (SyncChannel, ChannelEvents) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let peer_id = generate_player_id();

    let handle = SyncChannel {
        sender,
        role,
        game_code: game_code.clone(),
        peer_id: peer_id.clone(),
        max_message_bytes: config.max_message_bytes,
    };
    let actor = ChannelActor::new(transport, receiver, event_tx, config, role, game_code, peer_id);
    tokio::spawn(actor.run());

    (handle, event_rx)
}
