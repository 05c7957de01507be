//! Named profiles: persisted sets of enabled mod ids.
//!
//! One JSON descriptor file per profile, with the file stem as the logical
//! key. A profile is a set of *intentions*: applying it onto a catalog
//! silently ignores ids that are not installed, and capturing from a catalog
//! snapshots whatever is currently enabled. The auto-created "Default"
//! profile is protected and cannot be deleted or renamed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::jsonc;

/// Name of the auto-created protected profile.
pub const DEFAULT_PROFILE: &str = "Default";

/// A named, persisted set of enabled mod identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Unique, case-sensitive key; mirrors the file stem on disk.
    pub name: String,
    /// Protected profiles cannot be deleted or renamed.
    #[serde(default)]
    pub is_protected: bool,
    /// Ordered; duplicates are tolerated but not meaningful.
    #[serde(default)]
    pub enabled_mod_ids: Vec<String>,
}

impl Profile {
    pub fn new(name: &str, enabled_mod_ids: Vec<String>) -> Self {
        Profile {
            name: name.to_string(),
            is_protected: false,
            enabled_mod_ids,
        }
    }

    fn file_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.json"))
    }

    /// Load one profile file. The file stem is authoritative for the name.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read profile {:?}", path))?;
        let mut profile: Profile = jsonc::from_str_lenient(&text)
            .with_context(|| format!("parse profile {:?}", path))?;
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            profile.name = stem.to_string();
        }
        Ok(profile)
    }

    /// Write this profile's descriptor file into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("create profile dir {:?}", dir))?;
        let path = Self::file_path(dir, &self.name);
        let raw = serde_json::to_string_pretty(self).context("serialize profile")?;
        fs::write(&path, raw).with_context(|| format!("write profile {:?}", path))?;
        Ok(())
    }

    /// Set every catalog mod's enabled flag from this profile. Ids named in
    /// the profile but absent from the catalog are silently ignored.
    pub fn apply_to_catalog(&self, catalog: &mut Catalog) {
        for entry in &mut catalog.mods {
            entry.enabled = self
                .enabled_mod_ids
                .iter()
                .any(|id| entry.matches_id(id));
        }
    }

    /// Snapshot the catalog's currently enabled ids into this profile.
    pub fn capture_from_catalog(&mut self, catalog: &Catalog) {
        self.enabled_mod_ids = capture_from_catalog(catalog);
    }
}

/// The unique ids of every enabled mod, in catalog order.
pub fn capture_from_catalog(catalog: &Catalog) -> Vec<String> {
    catalog
        .enabled_mods()
        .iter()
        .map(|m| m.unique_id.clone())
        .collect()
}

/// Load every profile in `dir`, sorted by name. Malformed files are skipped
/// and logged, never fatal to the load.
pub fn load_all(dir: &Path) -> Result<Vec<Profile>> {
    let mut profiles = Vec::new();
    if !dir.exists() {
        return Ok(profiles);
    }

    for entry in fs::read_dir(dir).with_context(|| format!("read profile dir {:?}", dir))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match Profile::load(&path) {
            Ok(profile) => profiles.push(profile),
            Err(err) => {
                tracing::warn!("skipping malformed profile {:?}: {}", path, err);
            }
        }
    }

    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(profiles)
}

/// Ensure the protected default profile exists, creating it with an empty
/// list on first run. Returns the loaded or created profile.
pub fn ensure_default(dir: &Path) -> Result<Profile> {
    let path = Profile::file_path(dir, DEFAULT_PROFILE);
    if path.exists() {
        return Profile::load(&path);
    }
    let profile = Profile {
        name: DEFAULT_PROFILE.to_string(),
        is_protected: true,
        enabled_mod_ids: Vec::new(),
    };
    profile.save(dir)?;
    Ok(profile)
}

/// Create a new profile. Rejected without overwriting if a descriptor with
/// that name already exists.
pub fn create(dir: &Path, name: &str, initial_ids: Vec<String>) -> Result<Profile> {
    validate_name(name)?;
    let path = Profile::file_path(dir, name);
    if path.exists() {
        bail!("profile '{}' already exists", name);
    }
    let profile = Profile::new(name, initial_ids);
    profile.save(dir)?;
    Ok(profile)
}

/// Rename a profile. Protected profiles keep their name; a collision with
/// an existing descriptor is rejected without overwriting.
pub fn rename(dir: &Path, old_name: &str, new_name: &str) -> Result<Profile> {
    validate_name(new_name)?;
    let old_path = Profile::file_path(dir, old_name);
    let profile = Profile::load(&old_path)?;
    if profile.is_protected {
        bail!("profile '{}' is protected and cannot be renamed", old_name);
    }
    let new_path = Profile::file_path(dir, new_name);
    if new_path.exists() {
        bail!("profile '{}' already exists", new_name);
    }

    let renamed = Profile {
        name: new_name.to_string(),
        ..profile
    };
    renamed.save(dir)?;
    fs::remove_file(&old_path).with_context(|| format!("remove old profile {:?}", old_path))?;
    Ok(renamed)
}

/// Delete a profile. Rejected for protected profiles.
pub fn delete(dir: &Path, name: &str) -> Result<()> {
    let path = Profile::file_path(dir, name);
    let profile = Profile::load(&path)?;
    if profile.is_protected {
        bail!("profile '{}' is protected and cannot be deleted", name);
    }
    fs::remove_file(&path).with_context(|| format!("remove profile {:?}", path))?;
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("profile name cannot be empty");
    }
    if name.contains(['/', '\\']) || name.starts_with('.') {
        bail!("profile name '{}' is not a valid file name", name);
    }
    Ok(())
}
