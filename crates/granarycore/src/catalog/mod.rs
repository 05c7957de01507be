//! The mod catalog: every installed mod, discovered from disk.
//!
//! A catalog is rebuilt wholesale by [`Catalog::discover`]; it keeps no
//! enablement history across rebuilds, so callers re-apply a profile after
//! re-discovering. Mods with unparseable manifests are reported and skipped,
//! never fatal to discovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::version::ModVersion;

/// Remote compatibility verdict for a mod, as last reported by the update
/// index (or `Unknown` before any check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompatibilityStatus {
    Unknown,
    Ok,
    Optional,
    Unofficial,
    Workaround,
    Broken,
    Abandoned,
    Obsolete,
}

impl CompatibilityStatus {
    /// Canonical display label, resolved at the presentation boundary.
    pub fn label(self) -> &'static str {
        match self {
            CompatibilityStatus::Unknown => "unknown",
            CompatibilityStatus::Ok => "ok",
            CompatibilityStatus::Optional => "optional",
            CompatibilityStatus::Unofficial => "unofficial",
            CompatibilityStatus::Workaround => "workaround",
            CompatibilityStatus::Broken => "broken",
            CompatibilityStatus::Abandoned => "abandoned",
            CompatibilityStatus::Obsolete => "obsolete",
        }
    }

    /// Whether this status should be surfaced to the user as a problem.
    pub fn is_alert(self) -> bool {
        !matches!(self, CompatibilityStatus::Unknown | CompatibilityStatus::Ok)
    }
}

impl Default for CompatibilityStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A declared dependency of one mod on another.
///
/// `is_missing`/`is_hard` are views over current catalog membership, not
/// authoritative state: [`crate::resolver::compute_requirements`] recomputes
/// them whenever membership changes.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub required_id: String,
    pub minimum_version: Option<String>,
    pub is_required: bool,
    /// True iff no catalog mod matches `required_id` (case-insensitive).
    pub is_missing: bool,
    /// `is_required && !is_missing`.
    pub is_hard: bool,
}

/// An installed mod.
#[derive(Debug, Clone)]
pub struct Mod {
    /// Case-insensitive key, immutable after construction.
    pub unique_id: String,
    pub version: ModVersion,
    pub name: String,
    pub author: String,
    pub description: String,
    /// Mutated only through the resolver's cascade entry points and profile
    /// application, so cascades stay consistent.
    pub(crate) enabled: bool,
    pub compatibility_status: CompatibilityStatus,
    pub suggested_version: Option<String>,
    pub update_link: Option<String>,
    pub page_link: Option<String>,
    pub requirements: Vec<Requirement>,
    /// Directory backing this mod.
    pub install_location: PathBuf,
    /// Namespaced remote-lookup keys (`Provider:id`).
    pub update_keys: Vec<String>,
}

impl Mod {
    /// Build a mod from its parsed manifest and backing directory.
    ///
    /// A content pack's host contributes an implicit required dependency:
    /// the pack cannot run without the mod it extends.
    pub fn from_manifest(manifest: Manifest, install_location: PathBuf) -> Self {
        let mut requirements: Vec<Requirement> = manifest
            .dependencies
            .iter()
            .map(|dep| Requirement {
                required_id: dep.unique_id.clone(),
                minimum_version: dep.minimum_version.clone(),
                is_required: dep.is_required,
                is_missing: true,
                is_hard: false,
            })
            .collect();
        if let Some(host) = &manifest.content_pack_for {
            requirements.push(Requirement {
                required_id: host.unique_id.clone(),
                minimum_version: host.minimum_version.clone(),
                is_required: true,
                is_missing: true,
                is_hard: false,
            });
        }

        let name = if manifest.name.is_empty() {
            manifest.unique_id.clone()
        } else {
            manifest.name.clone()
        };

        Mod {
            unique_id: manifest.unique_id,
            version: ModVersion::parse(&manifest.version),
            name,
            author: manifest.author,
            description: manifest.description,
            enabled: false,
            compatibility_status: CompatibilityStatus::Unknown,
            suggested_version: None,
            update_link: None,
            page_link: None,
            requirements,
            install_location,
            update_keys: manifest.update_keys,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The directory name the materializer links under the target dir.
    pub fn folder_name(&self) -> &str {
        self.install_location
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.unique_id)
    }

    /// Whether `id` names this mod, ignoring case.
    pub fn matches_id(&self, id: &str) -> bool {
        self.unique_id.eq_ignore_ascii_case(id)
    }

    /// Requirement ids that are required but not installed.
    pub fn missing_required_ids(&self) -> Vec<&str> {
        self.requirements
            .iter()
            .filter(|req| req.is_required && req.is_missing)
            .map(|req| req.required_id.as_str())
            .collect()
    }
}

/// In-memory collection of discovered mods.
#[derive(Debug, Default)]
pub struct Catalog {
    pub mods: Vec<Mod>,
}

impl Catalog {
    /// Discover installed mods under `root`.
    ///
    /// Every immediate or nested directory containing a `manifest.json`
    /// yields one mod. Directories whose name starts with `.` are skipped
    /// when `ignore_hidden` is set. Duplicate unique ids keep the first
    /// discovered mod. Re-running discovery on an unchanged tree yields the
    /// same set of ids.
    pub fn discover(root: &Path, ignore_hidden: bool) -> Result<Self> {
        let mut mods: Vec<Mod> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let walker = WalkDir::new(root).follow_links(true).into_iter();
        let walker = walker.filter_entry(move |entry| {
            if !ignore_hidden || entry.depth() == 0 {
                return true;
            }
            !entry
                .file_name()
                .to_string_lossy()
                .starts_with('.')
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("skipping unreadable entry under {:?}: {}", root, err);
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || !entry
                    .file_name()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(MANIFEST_FILE)
            {
                continue;
            }

            let mod_dir = match entry.path().parent() {
                Some(dir) if dir != root => dir.to_path_buf(),
                _ => continue,
            };

            match Manifest::read(&mod_dir) {
                Ok(manifest) => {
                    if !seen.insert(manifest.unique_id.to_lowercase()) {
                        tracing::warn!(
                            "duplicate mod id {} at {:?}, keeping the first copy",
                            manifest.unique_id,
                            mod_dir
                        );
                        continue;
                    }
                    mods.push(Mod::from_manifest(manifest, mod_dir));
                }
                Err(err) => {
                    tracing::warn!("bad manifest in {:?}: {}", mod_dir, err);
                }
            }
        }

        mods.sort_by(|a, b| a.unique_id.to_lowercase().cmp(&b.unique_id.to_lowercase()));
        Ok(Catalog { mods })
    }

    /// Discover, then resolve requirement views in one step.
    pub fn discover_and_resolve(root: &Path, ignore_hidden: bool) -> Result<Self> {
        let mut catalog = Self::discover(root, ignore_hidden)
            .with_context(|| format!("discover mods under {:?}", root))?;
        crate::resolver::compute_requirements(&mut catalog);
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// Find a mod by unique id, case-insensitively.
    pub fn find(&self, unique_id: &str) -> Option<&Mod> {
        self.mods.iter().find(|m| m.matches_id(unique_id))
    }

    pub fn find_mut(&mut self, unique_id: &str) -> Option<&mut Mod> {
        self.mods.iter_mut().find(|m| m.matches_id(unique_id))
    }

    pub(crate) fn position(&self, unique_id: &str) -> Option<usize> {
        self.mods.iter().position(|m| m.matches_id(unique_id))
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.find(unique_id).is_some()
    }

    /// The currently enabled subset.
    pub fn enabled_mods(&self) -> Vec<&Mod> {
        self.mods.iter().filter(|m| m.enabled).collect()
    }

    /// Ids of every mod in the catalog, in catalog order.
    pub fn ids(&self) -> Vec<&str> {
        self.mods.iter().map(|m| m.unique_id.as_str()).collect()
    }
}
