//! The scoreboard model and the pure reducers that evolve it.
//!
//! Every reducer takes the current [`Game`] by reference and returns a new value. Nothing here
//! performs I/O, so the controller is free to apply a reducer, broadcast the result and persist it
//! in whatever order it needs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{generate_game_code, generate_player_id, GameCode, PlayerId, MAX_NAME_LEN};

/// Name given to a joiner whose request carried no name at all.
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Hole {
    pub name: String,
    pub par: u32,
}

impl Hole {
    pub fn new(name: impl Into<String>, par: u32) -> Self {
        Self {
            name: name.into(),
            par,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// One entry per hole. Zero means the hole has not been recorded yet.
    pub scores: Vec<u32>,
    pub is_host: bool,
}

impl Player {
    fn new(id: PlayerId, name: impl Into<String>, hole_count: usize, is_host: bool) -> Self {
        Self {
            id,
            name: name.into(),
            scores: vec![0; hole_count],
            is_host,
        }
    }

    pub fn total(&self) -> u64 {
        calculate_total(&self.scores)
    }

    /// Strokes over (positive) or under (negative) par for a recorded hole.
    pub fn score_to_par(&self, hole_index: usize, par: u32) -> Option<i64> {
        match self.scores.get(hole_index) {
            Some(&score) if score > 0 => Some(i64::from(score) - i64::from(par)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    #[serde(rename = "gameId", alias = "gameCode")]
    pub game_code: GameCode,
    pub holes: Vec<Hole>,
    pub players: Vec<Player>,
    #[serde(default)]
    pub current_hole: usize,
}

impl Game {
    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == player_id)
    }

    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.player(player_id).is_some()
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }
}

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("A game needs at least one hole")]
    NoHoles,
    #[error("Hole {0} has no name")]
    UnnamedHole(usize),
    #[error("Hole {0} has a par below 1")]
    InvalidPar(usize),
}

/// Check a course before a game is created from it.
///
/// # Errors
///
/// Returns the first problem found: an empty course, a blank hole name or a par of zero.
pub fn validate_holes(holes: &[Hole]) -> Result<(), GameError> {
    if holes.is_empty() {
        return Err(GameError::NoHoles);
    }
    for (i, hole) in holes.iter().enumerate() {
        if hole.name.trim().is_empty() {
            return Err(GameError::UnnamedHole(i));
        }
        if hole.par < 1 {
            return Err(GameError::InvalidPar(i));
        }
    }
    Ok(())
}

/// The course offered when a host starts setting up a new game.
pub fn default_course() -> Vec<Hole> {
    (1..=9u32)
        .map(|n| Hole::new(format!("Hole {n}"), 3 + (n - 1) % 3))
        .collect()
}

pub fn create_new_game(player_name: impl Into<String>, holes: Vec<Hole>) -> Game {
    let host = Player::new(generate_player_id(), player_name, holes.len(), true);
    Game {
        game_code: generate_game_code(),
        players: vec![host],
        holes,
        current_hole: 0,
    }
}

/// Append a non-host player. `external_id` is the joiner's transport identity when one is known.
///
/// The caller is responsible for passing an already sanitized name, see [`sanitize_player_name`].
pub fn add_player(game: &Game, player_name: impl Into<String>, external_id: Option<PlayerId>) -> Game {
    let id = external_id.unwrap_or_else(generate_player_id);
    let mut next = game.clone();
    next.players
        .push(Player::new(id, player_name, game.holes.len(), false));
    next
}

/// Replace the single score at `(player_id, hole_index)`.
///
/// An unknown player or a hole index past the end of the course leaves the game unchanged.
pub fn update_score(game: &Game, player_id: &PlayerId, hole_index: usize, score: u32) -> Game {
    let mut next = game.clone();
    if let Some(cell) = next
        .players
        .iter_mut()
        .find(|p| &p.id == player_id)
        .and_then(|p| p.scores.get_mut(hole_index))
    {
        *cell = score;
    }
    next
}

pub fn remove_player(game: &Game, player_id: &PlayerId) -> Game {
    let mut next = game.clone();
    next.players.retain(|p| &p.id != player_id);
    next
}

/// Sum of a scorecard. Widened to `u64` so no combination of `u32` scores can overflow.
pub fn calculate_total(scores: &[u32]) -> u64 {
    scores.iter().map(|&s| u64::from(s)).sum()
}

/// Players ordered best first. Lower totals win and ties keep join order.
pub fn leaderboard(game: &Game) -> Vec<&Player> {
    let mut ranked: Vec<&Player> = game.players.iter().collect();
    // sort_by_key is stable
    ranked.sort_by_key(|p| p.total());
    ranked
}

/// Clean up a display name received from another device.
///
/// Trims, keeps at most [`MAX_NAME_LEN`] characters and drops anything that is not a word
/// character, whitespace or a hyphen. Returns `None` when nothing usable is left.
///
/// Whitespace left exposed by the stripping is trimmed as well, so `"Bob !!"` becomes `"Bob"`
/// rather than keeping a trailing space.
pub fn sanitize_player_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .take(MAX_NAME_LEN)
        .filter(|&c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_owned())
    }
}

/// Parse free text typed into a score cell.
///
/// Reads the leading run of digits, so `"4 drinks"` is 4. Empty, negative or unparsable input is 0.
pub fn parse_score(raw: &str) -> u32 {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = unsigned.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
