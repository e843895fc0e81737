use crate::error::GameError;
use rand::Rng;
use std::fmt;

const KEY_MAX: usize = 64;

/// Stable per-player identifier. Doubles as the save document key, so it
/// is restricted to characters that are safe in a file name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlayerKey(String);

impl PlayerKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let ok = !raw.is_empty()
            && raw.len() <= KEY_MAX
            && raw
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        ok.then(|| Self(raw.to_string()))
    }

    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(format!("player-{:016x}", rng.gen::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reuses a stored key if it is still valid, otherwise mints a new one.
/// The flag is true when the key was just generated and needs storing.
pub fn resolve_key<R: Rng + ?Sized>(stored: Option<&str>, rng: &mut R) -> (PlayerKey, bool) {
    match stored.and_then(PlayerKey::parse) {
        Some(k) => (k, false),
        None => (PlayerKey::generate(rng), true),
    }
}

/// Whether the identity provider has answered yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Identity {
    #[default]
    Pending,
    Ready(PlayerKey),
}

impl Identity {
    pub fn key(&self) -> Result<&PlayerKey, GameError> {
        match self {
            Identity::Ready(k) => Ok(k),
            Identity::Pending => Err(GameError::NotReady),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Identity::Ready(_))
    }
}
