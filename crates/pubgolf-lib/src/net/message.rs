use serde::{Deserialize, Serialize};

use crate::game::Game;
use crate::PlayerId;

use super::ProtocolError;

/// Everything one participant of a game can say to the others.
///
/// Serialized as JSON with a `type` discriminator, e.g.
/// `{"type":"UPDATE_SCORE","playerId":"x1","holeIndex":2,"score":4}`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    #[serde(rename_all = "camelCase")]
    JoinGame {
        #[serde(default)]
        player_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GameState {
        game: Game,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        your_player_id: Option<PlayerId>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateScore {
        player_id: PlayerId,
        hole_index: usize,
        score: u32,
    },
    #[serde(rename_all = "camelCase")]
    LeaveGame { player_id: PlayerId },
    EndGame,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::JoinGame { .. } => "JOIN_GAME",
            Message::GameState { .. } => "GAME_STATE",
            Message::UpdateScore { .. } => "UPDATE_SCORE",
            Message::LeaveGame { .. } => "LEAVE_GAME",
            Message::EndGame => "END_GAME",
        }
    }
}

/// What actually travels over a topic: the message plus the identity of whoever published it.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub data: Message,
    pub sender_id: PlayerId,
}

/// Frames spoken between a TCP transport and the hub.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub enum HubFrame {
    Error { error: ProtocolError },
    Version { version: String },
    Accept,
    Subscribe { topic: String },
    Subscribed { topic: String },
    Unsubscribe { topic: String },
    Publish { topic: String, payload: String },
    Deliver { topic: String, payload: String },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{Envelope, Message};
    use crate::game::{create_new_game, Hole};

    #[test]
    fn wire_shape() {
        let msg = Message::UpdateScore {
            player_id: "x1".into(),
            hole_index: 2,
            score: 4,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "UPDATE_SCORE", "playerId": "x1", "holeIndex": 2, "score": 4})
        );
        assert_eq!(
            serde_json::to_value(Message::EndGame).unwrap(),
            json!({"type": "END_GAME"})
        );

        let envelope = Envelope {
            data: Message::LeaveGame {
                player_id: "x1".into(),
            },
            sender_id: "x1".into(),
        };
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"data": {"type": "LEAVE_GAME", "playerId": "x1"}, "senderId": "x1"})
        );
    }

    #[test]
    fn join_without_name() {
        let msg: Message = serde_json::from_str(r#"{"type":"JOIN_GAME"}"#).unwrap();
        assert_eq!(msg, Message::JoinGame { player_name: None });
        assert_eq!(msg.kind(), "JOIN_GAME");
    }

    #[test]
    fn game_state_omits_missing_player_id() {
        let game = create_new_game("Alice", vec![Hole::new("A", 3)]);
        let msg = Message::GameState {
            game: game.clone(),
            your_player_id: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("yourPlayerId").is_none());
        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<Message>(r#"{"type":"SHUFFLE"}"#).is_err());
    }
}
