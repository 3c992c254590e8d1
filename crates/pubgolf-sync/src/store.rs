//! Device-local persistence of the game in progress and of every game that can be resumed.
//!
//! Storage failures never interrupt play. [`SessionStore`] logs them and carries on as if
//! nothing had been stored.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use pubgolf_lib::game::{Game, Hole};
use pubgolf_lib::{GameCode, PlayerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CURRENT_GAME_KEY: &str = "@pubgolf:current_game";
pub const ACTIVE_GAMES_KEY: &str = "@pubgolf:active_games";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed stored value: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A string key-value store, the only thing a device needs to provide for persistence.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&mut self, key: &str, value: String) -> StoreResult<()>;
    fn remove(&mut self, key: &str) -> StoreResult<()>;
}

/// In-memory store. Clones share their contents, so a test can keep one clone to inspect what
/// a controller wrote through another.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> StoreResult<()> {
        self.lock().insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// # Errors
    ///
    /// Fails if the directory does not exist and cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: String) -> StoreResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        // Readers never observe a half-written file
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Everything needed to put a device back into the game it was last playing.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentGameSnapshot {
    pub game: Game,
    pub game_code: GameCode,
    pub player_name: String,
    pub my_player_id: PlayerId,
    pub is_host: bool,
    pub holes: Vec<Hole>,
}

/// Summary of a resumable game, one per game code.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub game_code: GameCode,
    pub player_name: String,
    pub my_player_id: PlayerId,
    pub is_host: bool,
    pub holes: Vec<Hole>,
    pub player_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl From<&CurrentGameSnapshot> for SessionRecord {
    fn from(snapshot: &CurrentGameSnapshot) -> Self {
        Self {
            game_code: snapshot.game_code.clone(),
            player_name: snapshot.player_name.clone(),
            my_player_id: snapshot.my_player_id.clone(),
            is_host: snapshot.is_host,
            holes: snapshot.game.holes.clone(),
            player_count: snapshot.game.players.len().max(1),
            last_updated: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct SessionStore<S> {
    kv: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn inner(&self) -> &S {
        &self.kv
    }

    /// Overwrite the current game and upsert its entry in the active games list.
    pub fn save_current_game(&mut self, snapshot: &CurrentGameSnapshot) {
        if let Err(e) = self.try_save_current_game(snapshot) {
            tracing::error!(game_code = %snapshot.game_code, %e, "Error saving game");
        }
    }

    pub fn current_game(&self) -> Option<CurrentGameSnapshot> {
        self.try_current_game().unwrap_or_else(|e| {
            tracing::error!(%e, "Error loading game");
            None
        })
    }

    pub fn clear_current_game(&mut self) {
        if let Err(e) = self.kv.remove(CURRENT_GAME_KEY) {
            tracing::error!(%e, "Error clearing game");
        }
    }

    pub fn active_games(&self) -> Vec<SessionRecord> {
        self.try_active_games().unwrap_or_else(|e| {
            tracing::error!(%e, "Error loading active games");
            Vec::new()
        })
    }

    pub fn add_to_active_games(&mut self, record: SessionRecord) {
        let game_code = record.game_code.clone();
        if let Err(e) = self.try_add_to_active_games(record) {
            tracing::error!(%game_code, %e, "Error adding to active games");
        }
    }

    pub fn remove_from_active_games(&mut self, game_code: &GameCode) {
        if let Err(e) = self.try_remove_from_active_games(game_code) {
            tracing::error!(%game_code, %e, "Error removing from active games");
        }
    }

    /// Drop every trace of a game that was left or ended.
    pub fn forget_game(&mut self, game_code: &GameCode) {
        let is_current = self
            .current_game()
            .map_or(true, |snapshot| &snapshot.game_code == game_code);
        if is_current {
            self.clear_current_game();
        }
        self.remove_from_active_games(game_code);
    }

    fn try_save_current_game(&mut self, snapshot: &CurrentGameSnapshot) -> StoreResult<()> {
        self.kv
            .set(CURRENT_GAME_KEY, serde_json::to_string(snapshot)?)?;
        self.try_add_to_active_games(snapshot.into())
    }

    fn try_current_game(&self) -> StoreResult<Option<CurrentGameSnapshot>> {
        match self.kv.get(CURRENT_GAME_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn try_active_games(&self) -> StoreResult<Vec<SessionRecord>> {
        match self.kv.get(ACTIVE_GAMES_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn try_add_to_active_games(&mut self, record: SessionRecord) -> StoreResult<()> {
        let mut games = self.try_active_games()?;
        match games.iter_mut().find(|g| g.game_code == record.game_code) {
            Some(existing) => *existing = record,
            None => games.push(record),
        }
        self.kv.set(ACTIVE_GAMES_KEY, serde_json::to_string(&games)?)
    }

    fn try_remove_from_active_games(&mut self, game_code: &GameCode) -> StoreResult<()> {
        let mut games = self.try_active_games()?;
        games.retain(|g| &g.game_code != game_code);
        self.kv.set(ACTIVE_GAMES_KEY, serde_json::to_string(&games)?)
    }
}
