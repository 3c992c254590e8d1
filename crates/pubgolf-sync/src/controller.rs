//! The per-device game state machine.
//!
//! A [`GameController`] owns the local copy of the [`Game`], feeds inbound channel traffic through
//! the reducers in [`pubgolf_lib::game`] and persists every accepted change. The host is the single
//! authority: after each mutation it rebroadcasts the whole game, and clients replace their copy
//! with whatever the host sent last.

use pubgolf_lib::game::{self, Game, GameError, Hole, Player};
use pubgolf_lib::net::Message;
use pubgolf_lib::{GameCode, PlayerId};
use thiserror::Error;

use crate::channel::{
    init_client, open_host, ChannelEvent, ChannelEvents, CloseReason, Role, SenderContext,
    SyncChannel,
};
use crate::config::SyncConfig;
use crate::store::{CurrentGameSnapshot, KeyValueStore, SessionStore};
use crate::transport::Transport;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    /// A client waiting for its first full game from the host.
    Connecting,
    Active,
    Ended,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Already taking part in a game.")]
    AlreadyInGame,
    #[error("There is no saved game to resume.")]
    NothingToResume,
    #[error("Invalid course: {0}")]
    InvalidCourse(#[from] GameError),
    #[error("A player name is required.")]
    InvalidName,
}

pub type ControllerResult<T> = Result<T, ControllerError>;

pub struct GameController<S> {
    store: SessionStore<S>,
    config: SyncConfig,
    state: ConnectionState,
    role: Option<Role>,
    game: Option<Game>,
    game_code: Option<GameCode>,
    player_name: String,
    my_player_id: Option<PlayerId>,
    channel: Option<SyncChannel>,
    events: Option<ChannelEvents>,
    // Set between join_game and the channel confirming its subscription
    pending_join: bool,
}

impl<S: KeyValueStore> GameController<S> {
    pub fn new(store: S, config: SyncConfig) -> Self {
        Self {
            store: SessionStore::new(store),
            config,
            state: ConnectionState::Idle,
            role: None,
            game: None,
            game_code: None,
            player_name: String::new(),
            my_player_id: None,
            channel: None,
            events: None,
            pending_join: false,
        }
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn my_player_id(&self) -> Option<&PlayerId> {
        self.my_player_id.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn game_code(&self) -> Option<&GameCode> {
        self.game_code.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Some(Role::Host)
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Players ordered best first. Empty when no game is loaded.
    pub fn leaderboard(&self) -> Vec<&Player> {
        self.game.as_ref().map(game::leaderboard).unwrap_or_default()
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    /// The transport identity of the live channel, if there is one.
    pub fn peer_id(&self) -> Option<&PlayerId> {
        self.channel.as_ref().map(SyncChannel::peer_id)
    }

    fn ensure_free(&self) -> ControllerResult<()> {
        match self.state {
            ConnectionState::Idle | ConnectionState::Ended => Ok(()),
            ConnectionState::Connecting | ConnectionState::Active => {
                Err(ControllerError::AlreadyInGame)
            }
        }
    }

    /// Create a game on `holes` and start hosting it.
    ///
    /// # Errors
    ///
    /// Fails if this controller is already in a game, the course is invalid or the name is blank.
    #[tracing::instrument(skip(self, transport, holes))]
    pub fn host_game(
        &mut self,
        transport: impl Transport,
        player_name: &str,
        holes: Vec<Hole>,
    ) -> ControllerResult<GameCode> {
        self.ensure_free()?;
        game::validate_holes(&holes)?;
        let player_name =
            game::sanitize_player_name(player_name).ok_or(ControllerError::InvalidName)?;

        let game = game::create_new_game(player_name.clone(), holes);
        let game_code = game.game_code.clone();
        let my_player_id = game.host().map(|p| p.id.clone());

        let (channel, events) = open_host(transport, self.config.clone(), game_code.clone());
        self.attach(channel, events, Role::Host);
        self.game = Some(game);
        self.game_code = Some(game_code.clone());
        self.player_name = player_name;
        self.my_player_id = my_player_id;
        self.state = ConnectionState::Active;
        self.persist();

        tracing::info!(%game_code, "Hosting game");
        Ok(game_code)
    }

    /// Subscribe to an existing game. `JOIN_GAME` goes out once the subscription is confirmed.
    ///
    /// Returns the identity this device will have in the host's roster.
    ///
    /// # Errors
    ///
    /// Fails if this controller is already in a game or the name is blank.
    #[tracing::instrument(skip(self, transport))]
    pub fn join_game(
        &mut self,
        transport: impl Transport,
        game_code: &str,
        player_name: &str,
    ) -> ControllerResult<PlayerId> {
        self.ensure_free()?;
        // Sent as typed, the host does the sanitizing
        let player_name = player_name.trim();
        if player_name.is_empty() {
            return Err(ControllerError::InvalidName);
        }
        let game_code = GameCode::from(game_code.trim().to_uppercase());

        let (channel, events, peer_id) =
            init_client(transport, self.config.clone(), game_code.clone());
        self.attach(channel, events, Role::Client);
        self.game = None;
        self.game_code = Some(game_code);
        self.player_name = player_name.to_owned();
        self.my_player_id = Some(peer_id.clone());
        self.state = ConnectionState::Connecting;
        self.pending_join = true;

        Ok(peer_id)
    }

    /// Pick the saved game back up under the role it was played with.
    ///
    /// The stored game is visible immediately. A host reopens its topic and is active straight
    /// away, a client waits for the host's next `GAME_STATE` without joining again.
    ///
    /// # Errors
    ///
    /// Fails if this controller is already in a game or nothing was saved.
    #[tracing::instrument(skip_all)]
    pub fn resume(&mut self, transport: impl Transport) -> ControllerResult<()> {
        self.ensure_free()?;
        let snapshot = self
            .store
            .current_game()
            .ok_or(ControllerError::NothingToResume)?;

        let game_code = snapshot.game_code.clone();
        self.game = Some(snapshot.game);
        self.game_code = Some(game_code.clone());
        self.player_name = snapshot.player_name;
        self.my_player_id = Some(snapshot.my_player_id);

        if snapshot.is_host {
            let (channel, events) = open_host(transport, self.config.clone(), game_code.clone());
            self.attach(channel, events, Role::Host);
            self.state = ConnectionState::Active;
        } else {
            let (channel, events, _) =
                init_client(transport, self.config.clone(), game_code.clone());
            self.attach(channel, events, Role::Client);
            self.state = ConnectionState::Connecting;
        }

        tracing::info!(%game_code, is_host = snapshot.is_host, "Resuming game");
        Ok(())
    }

    fn attach(&mut self, channel: SyncChannel, events: ChannelEvents, role: Role) {
        self.channel = Some(channel);
        self.events = Some(events);
        self.role = Some(role);
        self.pending_join = false;
    }

    fn detach(&mut self) {
        self.channel = None;
        self.events = None;
        self.pending_join = false;
    }

    /// Wait for the next channel event and handle it. Returns `false` once there is no channel
    /// left to listen to.
    pub async fn process_next(&mut self) -> bool {
        let Some(events) = self.events.as_mut() else {
            return false;
        };
        match events.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => {
                self.detach();
                false
            }
        }
    }

    /// Handle channel events until the channel closes.
    pub async fn run_until_closed(&mut self) {
        while self.process_next().await {}
    }

    pub fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Subscribed { game_code } => self.on_subscribed(game_code),
            ChannelEvent::Message { message, sender } => {
                if self.peer_id() == Some(&sender.sender_id) {
                    return;
                }
                self.on_message(message, sender);
            }
            ChannelEvent::Closed { reason } => self.on_closed(reason),
        }
    }

    fn on_message(&mut self, message: Message, sender: SenderContext) {
        match message {
            Message::JoinGame { player_name } => self.on_join(player_name, sender),
            Message::UpdateScore {
                player_id,
                hole_index,
                score,
            } => self.on_update_score(player_id, hole_index, score),
            Message::LeaveGame { player_id } => self.on_leave(player_id),
            Message::EndGame => self.on_end_game(),
            Message::GameState {
                game,
                your_player_id,
            } => self.on_game_state(game, your_player_id),
        }
    }

    fn send(&self, message: Message) {
        let Some(channel) = &self.channel else {
            tracing::debug!(kind = message.kind(), "No channel, not sending");
            return;
        };
        // Fire and forget. The channel has already logged anything it refused.
        if let Err(e) = channel.send(message) {
            tracing::debug!(%e, "Message not sent");
        }
    }

    fn broadcast_game(&self, your_player_id: Option<PlayerId>) {
        if !self.is_host() {
            return;
        }
        if let Some(game) = &self.game {
            self.send(Message::GameState {
                game: game.clone(),
                your_player_id,
            });
        }
    }

    fn persist(&mut self) {
        let (Some(game), Some(game_code), Some(my_player_id)) =
            (&self.game, &self.game_code, &self.my_player_id)
        else {
            return;
        };
        let snapshot = CurrentGameSnapshot {
            game: game.clone(),
            game_code: game_code.clone(),
            player_name: self.player_name.clone(),
            my_player_id: my_player_id.clone(),
            is_host: self.role == Some(Role::Host),
            holes: game.holes.clone(),
        };
        self.store.save_current_game(&snapshot);
    }

    fn forget(&mut self) {
        if let Some(game_code) = self.game_code.clone() {
            self.store.forget_game(&game_code);
        }
    }
}

// ----------------------------------------------------------------------------
// Local Actions
// ----------------------------------------------------------------------------
impl<S: KeyValueStore> GameController<S> {
    /// Record a score typed into the scorecard.
    ///
    /// The edit is applied and saved locally before it is sent. A host also rebroadcasts the
    /// resulting game so every device converges on it.
    #[tracing::instrument(skip(self))]
    pub fn submit_score(&mut self, player_id: &PlayerId, hole_index: usize, raw_score: &str) {
        let Some(current) = &self.game else {
            tracing::warn!("No game loaded, ignoring score");
            return;
        };
        let score = game::parse_score(raw_score);
        self.game = Some(game::update_score(current, player_id, hole_index, score));
        self.persist();

        self.send(Message::UpdateScore {
            player_id: player_id.clone(),
            hole_index,
            score,
        });
        self.broadcast_game(None);
    }

    /// Leave the game for good. Other devices are told, then the channel closes.
    #[tracing::instrument(skip(self))]
    pub fn leave_game(&mut self) {
        if let Some(me) = self.my_player_id.clone() {
            self.send(Message::LeaveGame { player_id: me });
        }
        self.forget();
        if let Some(channel) = &self.channel {
            channel.finish();
        }
        self.detach();
        self.game = None;
        self.state = ConnectionState::Idle;
        tracing::info!("Left game");
    }

    /// End the game for everyone.
    #[tracing::instrument(skip(self))]
    pub fn end_game(&mut self) {
        self.send(Message::EndGame);
        self.forget();
        if let Some(channel) = &self.channel {
            channel.finish();
        }
        self.detach();
        self.game = None;
        self.state = ConnectionState::Ended;
        tracing::info!("Ended game");
    }

    /// Walk away without telling anyone. The saved game stays resumable.
    #[tracing::instrument(skip(self))]
    pub fn exit(&mut self) {
        if let Some(channel) = &self.channel {
            channel.disconnect();
        }
        self.detach();
        self.game = None;
        self.state = ConnectionState::Idle;
    }
}

// ----------------------------------------------------------------------------
// Channel Event Handlers
// ----------------------------------------------------------------------------
impl<S: KeyValueStore> GameController<S> {
    fn on_subscribed(&mut self, game_code: GameCode) {
        tracing::info!(%game_code, "Channel ready");
        if self.pending_join {
            self.pending_join = false;
            self.send(Message::JoinGame {
                player_name: Some(self.player_name.clone()),
            });
        }
        if self.is_host() {
            self.persist();
        }
    }

    fn on_closed(&mut self, reason: CloseReason) {
        tracing::info!(?reason, "Channel closed");
        self.detach();
        // Whatever was saved stays resumable
        if self.state != ConnectionState::Ended {
            self.state = ConnectionState::Idle;
        }
    }

    #[tracing::instrument(skip(self))]
    fn on_join(&mut self, player_name: Option<String>, sender: SenderContext) {
        let Some(current) = &self.game else {
            tracing::debug!("No game loaded, ignoring join");
            return;
        };
        let joiner = sender.sender_id;

        if current.contains_player(&joiner) {
            tracing::info!(%joiner, "Player rejoined");
            self.broadcast_game(Some(joiner));
            return;
        }

        let raw_name = player_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| game::ANONYMOUS.to_owned());
        let Some(name) = game::sanitize_player_name(&raw_name) else {
            tracing::warn!(%raw_name, "Rejecting join with unusable name");
            return;
        };

        self.game = Some(game::add_player(current, name.clone(), Some(joiner.clone())));
        self.persist();
        tracing::info!(%joiner, %name, "Player joined");
        self.broadcast_game(Some(joiner));
    }

    #[tracing::instrument(skip(self))]
    fn on_update_score(&mut self, player_id: PlayerId, hole_index: usize, score: u32) {
        let Some(current) = &self.game else {
            tracing::debug!("No game loaded, ignoring score");
            return;
        };
        if !current.contains_player(&player_id) {
            tracing::warn!("Score for unknown player");
            return;
        }
        self.game = Some(game::update_score(current, &player_id, hole_index, score));
        self.persist();
        self.broadcast_game(None);
    }

    #[tracing::instrument(skip(self))]
    fn on_leave(&mut self, player_id: PlayerId) {
        let Some(current) = &self.game else {
            return;
        };
        if !current.contains_player(&player_id) {
            tracing::warn!("Unknown player left");
            return;
        }
        self.game = Some(game::remove_player(current, &player_id));
        self.persist();
        tracing::info!("Player left");
        self.broadcast_game(None);
    }

    fn on_end_game(&mut self) {
        tracing::info!("Game ended by another player");
        self.forget();
        if let Some(channel) = &self.channel {
            channel.disconnect();
        }
        self.detach();
        self.game = None;
        self.state = ConnectionState::Ended;
    }

    fn on_game_state(&mut self, game: Game, your_player_id: Option<PlayerId>) {
        if self.is_host() {
            tracing::warn!("Ignoring game state from another device while hosting");
            return;
        }

        // Only the joiner named in the message takes the id. Everyone else keeps their own.
        if let Some(id) = your_player_id {
            if self.peer_id() == Some(&id) {
                self.my_player_id = Some(id);
            }
        }
        tracing::debug!(players = game.players.len(), "Received game state");
        self.game_code = Some(game.game_code.clone());
        self.game = Some(game);
        self.pending_join = false;
        self.state = ConnectionState::Active;
        self.persist();
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use pubgolf_lib::game::{add_player, create_new_game, default_course, Hole};
    use pubgolf_lib::net::Message;
    use tokio::time::timeout;

    use super::{ConnectionState, ControllerError, GameController};
    use crate::channel::{ChannelEvent, CloseReason, SenderContext};
    use crate::config::SyncConfig;
    use crate::store::{MemoryStore, SessionStore};
    use crate::transport::LocalHub;

    fn course() -> Vec<Hole> {
        vec![Hole::new("A", 3), Hole::new("B", 4), Hole::new("C", 5)]
    }

    fn host(hub: &LocalHub) -> GameController<MemoryStore> {
        let mut host = GameController::new(MemoryStore::new(), SyncConfig::default());
        host.host_game(hub.connect(), "Alice", course()).unwrap();
        host
    }

    fn from(id: &str) -> SenderContext {
        SenderContext {
            sender_id: id.into(),
        }
    }

    fn message(message: Message, id: &str) -> ChannelEvent {
        ChannelEvent::Message {
            message,
            sender: from(id),
        }
    }

    #[tokio::test]
    async fn host_game_starts_active() {
        let hub = LocalHub::new();
        let host = host(&hub);

        assert_eq!(host.connection_state(), ConnectionState::Active);
        assert!(host.is_host());
        let game = host.game().unwrap();
        assert_eq!(game.players.len(), 1);
        assert_eq!(host.my_player_id(), Some(&game.players[0].id));
        // Saved straight away
        let saved = host.store().current_game().unwrap();
        assert!(saved.is_host);
        assert_eq!(&saved.game, game);
    }

    #[tokio::test]
    async fn host_game_rejects_bad_input() {
        let hub = LocalHub::new();
        let mut c = GameController::new(MemoryStore::new(), SyncConfig::default());
        assert_eq!(
            c.host_game(hub.connect(), "Alice", Vec::new()),
            Err(ControllerError::InvalidCourse(
                pubgolf_lib::game::GameError::NoHoles
            ))
        );
        assert_eq!(
            c.host_game(hub.connect(), "  !!  ", default_course()),
            Err(ControllerError::InvalidName)
        );
        c.host_game(hub.connect(), "Alice", default_course()).unwrap();
        assert_eq!(
            c.host_game(hub.connect(), "Alice", default_course()),
            Err(ControllerError::AlreadyInGame)
        );
        assert!(matches!(
            c.join_game(hub.connect(), "ABC123", "Bob"),
            Err(ControllerError::AlreadyInGame)
        ));
    }

    #[tokio::test]
    async fn host_applies_join_with_sender_identity() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        host.handle_event(message(
            Message::JoinGame {
                player_name: Some("  Bob!! ".to_owned()),
            },
            "peer-bob",
        ));

        let game = host.game().unwrap();
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.players[1].name, "Bob");
        assert_eq!(game.players[1].id, "peer-bob");
        assert_eq!(host.store().active_games()[0].player_count, 2);

        // The same identity joining again is not duplicated
        host.handle_event(message(
            Message::JoinGame {
                player_name: Some("Bob".to_owned()),
            },
            "peer-bob",
        ));
        assert_eq!(host.game().unwrap().players.len(), 2);
    }

    #[tokio::test]
    async fn join_without_name_is_anonymous() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        host.handle_event(message(Message::JoinGame { player_name: None }, "p2"));
        host.handle_event(message(
            Message::JoinGame {
                player_name: Some("$$$".to_owned()),
            },
            "p3",
        ));

        let game = host.game().unwrap();
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.players[1].name, "Anonymous");
    }

    #[tokio::test]
    async fn score_for_unknown_player_is_ignored() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        let before = host.game().cloned();
        host.handle_event(message(
            Message::UpdateScore {
                player_id: "ghost".into(),
                hole_index: 0,
                score: 4,
            },
            "ghost",
        ));
        assert_eq!(host.game().cloned(), before);
    }

    #[tokio::test]
    async fn remote_score_and_leave() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        host.handle_event(message(
            Message::JoinGame {
                player_name: Some("Bob".to_owned()),
            },
            "bob",
        ));
        host.handle_event(message(
            Message::UpdateScore {
                player_id: "bob".into(),
                hole_index: 2,
                score: 7,
            },
            "bob",
        ));
        assert_eq!(host.game().unwrap().players[1].scores, vec![0, 0, 7]);

        host.handle_event(message(
            Message::LeaveGame {
                player_id: "bob".into(),
            },
            "bob",
        ));
        assert_eq!(host.game().unwrap().players.len(), 1);
        assert_eq!(host.store().current_game().unwrap().game.players.len(), 1);
    }

    #[tokio::test]
    async fn host_ignores_foreign_game_state() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        let before = host.game().cloned();
        let imposter = create_new_game("Mallory", course());
        host.handle_event(message(
            Message::GameState {
                game: imposter,
                your_player_id: None,
            },
            "mallory",
        ));
        assert_eq!(host.game().cloned(), before);
    }

    #[tokio::test]
    async fn submit_score_parses_text() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        let me = host.my_player_id().cloned().unwrap();
        host.submit_score(&me, 1, " 5 drinks");
        assert_eq!(host.game().unwrap().players[0].scores, vec![0, 5, 0]);
        host.submit_score(&me, 1, "-3");
        assert_eq!(host.game().unwrap().players[0].scores, vec![0, 0, 0]);
        // Out of range is a no-op
        host.submit_score(&me, 9, "4");
        assert_eq!(host.game().unwrap().players[0].scores, vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn client_ignores_traffic_before_first_state() {
        let hub = LocalHub::new();
        let mut client = GameController::new(MemoryStore::new(), SyncConfig::default());
        client.join_game(hub.connect(), "abc123", "Bob").unwrap();
        assert_eq!(client.game_code().unwrap(), "ABC123");
        assert_eq!(client.connection_state(), ConnectionState::Connecting);

        client.handle_event(message(
            Message::UpdateScore {
                player_id: "x".into(),
                hole_index: 0,
                score: 3,
            },
            "host",
        ));
        assert!(client.game().is_none());
        assert_eq!(client.connection_state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn client_only_adopts_its_own_id() {
        let hub = LocalHub::new();
        let mut client = GameController::new(MemoryStore::new(), SyncConfig::default());
        let my_id = client.join_game(hub.connect(), "ABC123", "Bob").unwrap();

        let game = create_new_game("Alice", course());
        let game = add_player(&game, "Carol", Some("carol".into()));
        client.handle_event(message(
            Message::GameState {
                game: game.clone(),
                your_player_id: Some("carol".into()),
            },
            "host",
        ));
        assert_eq!(client.my_player_id(), Some(&my_id));
        assert_eq!(client.game(), Some(&game));
        assert_eq!(client.connection_state(), ConnectionState::Active);
    }

    #[tokio::test]
    async fn end_game_from_remote() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        host.handle_event(message(Message::EndGame, "bob"));

        assert_eq!(host.connection_state(), ConnectionState::Ended);
        assert!(host.game().is_none());
        assert_eq!(host.store().current_game(), None);
        assert!(host.store().active_games().is_empty());
        assert!(!host.process_next().await);
    }

    #[tokio::test]
    async fn closed_channel_keeps_game_resumable() {
        let hub = LocalHub::new();
        let kv = MemoryStore::new();
        let mut host = GameController::new(kv.clone(), SyncConfig::default());
        host.host_game(hub.connect(), "Alice", course()).unwrap();
        host.handle_event(ChannelEvent::Closed {
            reason: CloseReason::Inactivity,
        });

        assert_eq!(host.connection_state(), ConnectionState::Idle);
        assert!(SessionStore::new(kv.clone()).current_game().is_some());

        let mut again = GameController::new(kv, SyncConfig::default());
        again.resume(hub.connect()).unwrap();
        assert!(again.is_host());
        assert_eq!(again.connection_state(), ConnectionState::Active);
        assert_eq!(again.game(), host.game());
    }

    #[tokio::test]
    async fn exit_keeps_saved_game() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        let code = host.game_code().cloned().unwrap();
        host.exit();

        assert_eq!(host.connection_state(), ConnectionState::Idle);
        assert!(host.game().is_none());
        assert_eq!(host.store().current_game().unwrap().game_code, code);
    }

    #[tokio::test]
    async fn leave_game_forgets_it() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        host.leave_game();

        assert_eq!(host.connection_state(), ConnectionState::Idle);
        assert!(host.game().is_none());
        assert_eq!(host.store().current_game(), None);
        assert_eq!(
            host.resume(hub.connect()),
            Err(ControllerError::NothingToResume)
        );
    }

    #[tokio::test]
    async fn own_envelopes_ignored_even_with_self_delivery() {
        let hub = LocalHub::new();
        let config = SyncConfig::default().with_self_delivery(true);
        let mut host = GameController::new(MemoryStore::new(), config);
        host.host_game(hub.connect(), "Alice", course()).unwrap();
        let me = host.peer_id().cloned().unwrap();

        host.handle_event(message(
            Message::JoinGame {
                player_name: Some("Echo".to_owned()),
            },
            me.as_str(),
        ));
        assert_eq!(host.game().unwrap().players.len(), 1);
    }

    #[tokio::test]
    async fn host_processes_its_subscription() {
        let hub = LocalHub::new();
        let mut host = host(&hub);
        let processed = timeout(Duration::from_secs(1), host.process_next())
            .await
            .unwrap();
        assert!(processed);
        assert_eq!(host.connection_state(), ConnectionState::Active);
    }
}
