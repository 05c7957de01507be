//! Well-known locations, resolved once and passed into operations
//! explicitly instead of read from global state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Everything the engine reads or writes on disk: the game's mod library,
/// the materialization target the launcher consumes, and the manager's own
/// state (profiles, update cache).
#[derive(Debug, Clone)]
pub struct ManagerPaths {
    game_dir: PathBuf,
    state_root: PathBuf,
}

impl ManagerPaths {
    /// Resolve with the platform's config directory as the state root.
    pub fn discover(game_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = dirs::config_dir().context("no user config directory")?;
        Ok(Self::with_state_root(game_dir, config_dir.join("granary")))
    }

    /// Resolve against an explicit state root. Tests and portable installs
    /// use this instead of the platform default.
    pub fn with_state_root(game_dir: impl Into<PathBuf>, state_root: impl Into<PathBuf>) -> Self {
        ManagerPaths {
            game_dir: game_dir.into(),
            state_root: state_root.into(),
        }
    }

    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    /// Library of installed mods, one directory per mod.
    pub fn mod_library(&self) -> PathBuf {
        self.state_root.join("library")
    }

    /// Directory of links the launcher reads. Exclusively owned by the
    /// materializer.
    pub fn active_mods_dir(&self) -> PathBuf {
        self.game_dir.join("Mods")
    }

    /// One JSON descriptor per profile.
    pub fn profiles_dir(&self) -> PathBuf {
        self.state_root.join("profiles")
    }

    pub fn update_cache_file(&self) -> PathBuf {
        self.state_root.join("update-cache.json")
    }

    /// The loader's most recent log, the source of [`crate::game::GameDetails`].
    pub fn loader_log_file(&self) -> PathBuf {
        self.game_dir.join("loader-latest.txt")
    }

    /// Create the directories the manager owns. The game directory is left
    /// alone; its absence is the caller's error to report.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.mod_library(), self.profiles_dir()] {
            fs::create_dir_all(&dir).with_context(|| format!("create {:?}", dir))?;
        }
        Ok(())
    }
}
