//! Game and loader facts read from the loader's log file.
//!
//! The loader writes a banner line on startup, e.g.
//! `Harvest Loader 4.1.10 with Harvest Valley 1.6.15 on Windows`. Those
//! facts are derived once per log read and feed the remote update query and
//! the cache-invalidation check.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Platform reported to the update index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingSystem {
    Unknown,
    Linux,
    Mac,
    Windows,
}

impl OperatingSystem {
    pub fn label(self) -> &'static str {
        match self {
            OperatingSystem::Unknown => "Unknown",
            OperatingSystem::Linux => "Linux",
            OperatingSystem::Mac => "Mac",
            OperatingSystem::Windows => "Windows",
        }
    }

    fn parse(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower.starts_with("linux") {
            OperatingSystem::Linux
        } else if lower.starts_with("mac") || lower.starts_with("osx") {
            OperatingSystem::Mac
        } else if lower.starts_with("win") {
            OperatingSystem::Windows
        } else {
            OperatingSystem::Unknown
        }
    }

    /// The platform this process runs on, used when no log is available.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => OperatingSystem::Linux,
            "macos" => OperatingSystem::Mac,
            "windows" => OperatingSystem::Windows,
            _ => OperatingSystem::Unknown,
        }
    }
}

/// Versions and platform context for one update check.
#[derive(Debug, Clone)]
pub struct GameDetails {
    pub game_version: String,
    /// The mod loader's own version.
    pub launcher_version: String,
    pub operating_system: OperatingSystem,
}

impl GameDetails {
    /// Parse the loader's log banner. Only the first few lines are
    /// considered; the banner has the shape
    /// `<loader name> <version> with <game name> <version> on <platform>`.
    pub fn from_log(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read loader log {:?}", path))?;
        text.lines()
            .take(10)
            .find_map(Self::parse_banner)
            .with_context(|| format!("no loader banner in {:?}", path))
    }

    fn parse_banner(line: &str) -> Option<Self> {
        let (front, platform) = line.rsplit_once(" on ")?;
        let (loader_part, game_part) = front.split_once(" with ")?;
        Some(GameDetails {
            launcher_version: last_version_token(loader_part)?,
            game_version: last_version_token(game_part)?,
            operating_system: OperatingSystem::parse(platform),
        })
    }

    /// Facts for a machine with no loader log: unknown versions, current OS.
    pub fn unknown() -> Self {
        GameDetails {
            game_version: String::new(),
            launcher_version: String::new(),
            operating_system: OperatingSystem::current(),
        }
    }

    /// Whether the loader version differs from the one a cache was built
    /// against, which invalidates cached compatibility verdicts.
    pub fn has_launcher_updated(&self, current_version: &str) -> bool {
        !self.launcher_version.is_empty()
            && self.launcher_version.trim() != current_version.trim()
    }
}

fn last_version_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .rev()
        .find(|token| token.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(|token| token.to_string())
}
