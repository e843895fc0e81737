use crate::error::GameError;
use crate::identity::Identity;
use crate::model::{FullState, Rules};
use crate::spawn::starter_state;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const SAVE_VERSION: u32 = 1;

/// On-disk record: the game state flattened next to a little bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveFile {
    #[serde(default)]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub last_saved_utc: DateTime<Utc>,
    #[serde(flatten)]
    pub state: FullState,
}

/// Document store keyed by player. `load` of an unknown key is
/// `GameError::NotFound`; anything else going wrong is `Persistence`.
pub trait SaveStore {
    fn load(&self, key: &str) -> Result<FullState, GameError>;
    fn save(&self, key: &str, state: &FullState) -> Result<(), GameError>;
}

/// One JSON file per player inside `dir`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SaveStore for FileStore {
    fn load(&self, key: &str) -> Result<FullState, GameError> {
        let path = self.path_for(key);
        let s = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(GameError::NotFound),
            Err(e) => return Err(e.into()),
        };
        let save: SaveFile = serde_json::from_str(&s)?;
        Ok(save.state)
    }

    fn save(&self, key: &str, state: &FullState) -> Result<(), GameError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let save = SaveFile {
            version: SAVE_VERSION,
            last_saved_utc: Utc::now(),
            state: state.clone(),
        };
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(&save)?;
        fs::write(&tmp, data)?;
        atomic_rename(&tmp, &path)?;
        Ok(())
    }
}

pub fn atomic_rename(from: &Path, to: &Path) -> io::Result<()> {
    // Best-effort atomic replace on the same filesystem.
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
}

/// Restores a player's den, repairing out-of-range values on the way in.
pub fn load_game(store: &dyn SaveStore, identity: &Identity) -> Result<FullState, GameError> {
    let key = identity.key()?;
    let mut state = store.load(key.as_str())?;
    state.sanitize();
    info!(
        "loaded save for {key}: {} creature(s), {} diary entries",
        state.roster.len(),
        state.diary.len()
    );
    Ok(state)
}

pub fn save_game(
    store: &dyn SaveStore,
    identity: &Identity,
    state: &FullState,
) -> Result<(), GameError> {
    let key = identity.key()?;
    store.save(key.as_str(), state).map_err(|e| {
        warn!("save for {key} failed: {e}");
        e
    })?;
    info!("saved {key}");
    Ok(())
}

/// Starts over with the starter den and writes it out straight away.
pub fn new_game<R: Rng + ?Sized>(
    store: &dyn SaveStore,
    identity: &Identity,
    rules: &Rules,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<FullState, GameError> {
    let key = identity.key()?;
    let state = starter_state(rules, rng, now);
    store.save(key.as_str(), &state)?;
    info!("new game for {key}");
    Ok(state)
}
