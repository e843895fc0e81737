use crate::battle::EnemyCatalog;
use crate::storage::atomic_rename;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Save key. Generated on first launch and kept afterwards.
    pub player_id: Option<String>,
    pub fps_cap: u32,
    pub enable_color: bool,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// env_logger filter, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_id: None,
            fps_cap: 30,
            enable_color: true,
            seed: None,
            log_filter: "info".to_string(),
        }
    }
}

pub struct Paths {
    pub saves_dir: PathBuf,
    pub settings_path: PathBuf,
    pub log_path: PathBuf,
    pub enemies_path: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "critterden", "Critterden")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(Paths {
        saves_dir: dir.join("saves"),
        settings_path: dir.join("settings.json"),
        log_path: dir.join("critterden.log"),
        enemies_path: dir.join("enemies.json"),
    })
}

pub fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        match serde_json::from_str::<Settings>(&s) {
            Ok(v) => return v,
            Err(e) => warn!("ignoring unreadable {}: {e}", path.display()),
        }
    }
    Settings::default()
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

/// Reads a replacement enemy list if one is installed. A missing file means
/// the built-in catalog; a broken or empty one is reported and skipped.
pub fn load_enemy_catalog(path: &Path) -> EnemyCatalog {
    let Ok(s) = fs::read_to_string(path) else {
        return EnemyCatalog::default();
    };
    match serde_json::from_str::<EnemyCatalog>(&s) {
        Ok(cat) if !cat.enemies.is_empty() => {
            info!("loaded {} enemies from {}", cat.enemies.len(), path.display());
            cat
        }
        Ok(_) => {
            warn!("{} lists no enemies; using built-ins", path.display());
            EnemyCatalog::default()
        }
        Err(e) => {
            warn!("bad enemy file {}: {e}", path.display());
            EnemyCatalog::default()
        }
    }
}

/// Logs go to a file; stdout belongs to the terminal UI.
pub fn init_logging(path: &Path, filter: &str) -> Result<()> {
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    env_logger::Builder::new()
        .parse_filters(filter)
        .parse_env("RUST_LOG")
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("logger already installed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "critterden-cfg-{}-{}-{name}",
            std::process::id(),
            rand::random::<u32>()
        ))
    }

    #[test]
    fn settings_survive_a_round_trip() {
        let path = scratch("settings.json");
        let s = Settings {
            player_id: Some("player-1".into()),
            seed: Some(7),
            ..Settings::default()
        };
        save_settings_atomic(&path, &s).unwrap();
        assert_eq!(load_settings(&path), s);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let path = scratch("partial.json");
        fs::write(&path, r#"{"fps_cap": 60}"#).unwrap();
        let s = load_settings(&path);
        assert_eq!(s.fps_cap, 60);
        assert_eq!(s.log_filter, "info");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn enemy_file_falls_back_to_builtins() {
        assert_eq!(
            load_enemy_catalog(&scratch("absent.json")),
            EnemyCatalog::default()
        );
        let path = scratch("enemies.json");
        fs::write(&path, "[]").unwrap();
        assert_eq!(load_enemy_catalog(&path), EnemyCatalog::default());
        fs::write(
            &path,
            r#"[{"name":"Newt","hp":4,"attack":1,"defense":0,"glyph":"~"}]"#,
        )
        .unwrap();
        assert_eq!(load_enemy_catalog(&path).enemies[0].name, "Newt");
        let _ = fs::remove_file(&path);
    }
}
