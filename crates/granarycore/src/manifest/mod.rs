//! Mod manifest parsing.
//!
//! Every installed mod ships a `manifest.json` describing its identity,
//! version, dependencies and remote update keys. The files are authored by
//! hand, so parsing is deliberately forgiving: `//` comments and trailing
//! commas are accepted, and a structural failure is retried once with CR/LF
//! characters stripped (some descriptors embed raw control characters inside
//! string literals). Only after the retry does a manifest count as bad, and
//! a bad manifest excludes that one mod, never the surrounding discovery.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::jsonc;

/// File name of the per-mod descriptor.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Update-key provider assumed for bare numeric keys.
const DEFAULT_UPDATE_PROVIDER: &str = "Nexus";

/// Why a manifest could not be turned into a [`Manifest`].
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("manifest has no UniqueID")]
    MissingId,
}

/// A dependency declared in a manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestDependency {
    #[serde(rename = "UniqueID")]
    pub unique_id: String,
    #[serde(default)]
    pub minimum_version: Option<String>,
    /// Absent in the source data means required.
    #[serde(default = "default_true")]
    pub is_required: bool,
}

/// The host mod a content pack extends.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentPackFor {
    #[serde(rename = "UniqueID")]
    pub unique_id: String,
    #[serde(default)]
    pub minimum_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawManifest {
    #[serde(rename = "UniqueID", default)]
    unique_id: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    update_keys: Vec<String>,
    #[serde(default)]
    dependencies: Vec<ManifestDependency>,
    #[serde(default)]
    content_pack_for: Option<ContentPackFor>,
    #[serde(default)]
    delete_old_version_on_update: bool,
}

/// A parsed mod descriptor. Unknown fields in the source are ignored.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub unique_id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub update_keys: Vec<String>,
    pub dependencies: Vec<ManifestDependency>,
    pub content_pack_for: Option<ContentPackFor>,
    pub delete_old_version_on_update: bool,
}

impl Manifest {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let sanitized = jsonc::sanitize(text);
        let raw = match serde_json::from_str::<RawManifest>(&sanitized) {
            Ok(raw) => raw,
            Err(first_err) => {
                let stripped: String = sanitized
                    .chars()
                    .filter(|c| *c != '\r' && *c != '\n')
                    .collect();
                match serde_json::from_str::<RawManifest>(&stripped) {
                    Ok(raw) => raw,
                    Err(_) => return Err(ManifestError::Parse(first_err)),
                }
            }
        };
        Self::from_raw(raw)
    }

    /// Read and parse `manifest.json` from a mod directory.
    pub fn read(mod_dir: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(mod_dir.join(MANIFEST_FILE))?;
        Self::parse(&text)
    }

    fn from_raw(raw: RawManifest) -> Result<Self, ManifestError> {
        if raw.unique_id.trim().is_empty() {
            return Err(ManifestError::MissingId);
        }

        let update_keys = raw
            .update_keys
            .into_iter()
            .map(|key| normalize_update_key(&key))
            .filter(|key| !key.is_empty())
            .collect();

        Ok(Manifest {
            unique_id: raw.unique_id.trim().to_string(),
            version: raw.version,
            name: raw.name,
            description: raw.description,
            author: raw.author,
            update_keys,
            dependencies: raw.dependencies,
            content_pack_for: raw.content_pack_for,
            delete_old_version_on_update: raw.delete_old_version_on_update,
        })
    }

    /// Whether this mod is a content pack for another mod.
    pub fn is_content_pack(&self) -> bool {
        self.content_pack_for.is_some()
    }
}

/// Update keys are free-form `Provider:id` strings, except that a purely
/// numeric key is shorthand for an id under the default provider.
fn normalize_update_key(key: &str) -> String {
    let trimmed = key.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{DEFAULT_UPDATE_PROVIDER}:{trimmed}")
    } else {
        trimmed.to_string()
    }
}

fn default_true() -> bool {
    true
}
