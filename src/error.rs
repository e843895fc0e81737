use thiserror::Error;

/// Every failure a player action or the persistence layer can produce.
///
/// None of these are fatal: the app turns them into a dismissible notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("no gacha tokens left")]
    InsufficientTokens,
    #[error("no food left")]
    InsufficientFood,
    #[error("the den is full (at most {max} living creatures)")]
    RosterFull { max: usize },
    #[error("breeding needs two creatures with growth and friendship of at least 50")]
    NotEnoughParents,
    #[error("creature {0} is gone")]
    CreatureNotFound(String),
    #[error("no save data found")]
    NotFound,
    #[error("save backend failed: {0}")]
    Persistence(String),
    #[error("player identity is not available yet")]
    NotReady,
    #[error("no living creature can go on an adventure")]
    NoLivingCreatures,
    #[error("an adventure is already under way")]
    AdventureInProgress,
    #[error("there is no adventure to act on")]
    NoAdventure,
    #[error("it is not that side's turn")]
    OutOfTurn,
    #[error("the enemy catalog is empty")]
    EmptyCatalog,
}

impl GameError {
    /// Short heading for the notice box.
    pub fn title(&self) -> &'static str {
        match self {
            GameError::InsufficientTokens | GameError::InsufficientFood => "Not enough",
            GameError::RosterFull { .. } | GameError::NotEnoughParents => "Can't do that",
            GameError::CreatureNotFound(_) => "Missing",
            GameError::NotFound => "No save",
            GameError::Persistence(_) | GameError::NotReady => "Save trouble",
            GameError::NoLivingCreatures
            | GameError::AdventureInProgress
            | GameError::NoAdventure
            | GameError::OutOfTurn
            | GameError::EmptyCatalog => "Adventure",
        }
    }
}

impl From<serde_json::Error> for GameError {
    fn from(e: serde_json::Error) -> Self {
        GameError::Persistence(e.to_string())
    }
}

impl From<std::io::Error> for GameError {
    fn from(e: std::io::Error) -> Self {
        GameError::Persistence(e.to_string())
    }
}
