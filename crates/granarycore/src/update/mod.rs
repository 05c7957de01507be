//! Update cache and remote compatibility checks.
//!
//! A check reconciles the catalog against the remote compatibility index:
//! one batched query carries every installed mod's id, update keys and
//! version (plus the ids of required-but-missing dependencies, so the remote
//! can resolve their display names), and the response annotates catalog
//! entries with suggested updates and compatibility verdicts.
//!
//! Last-known results are persisted in a cache file that is treated as
//! disposable: absent or corrupt simply means "no cache". Entries are
//! upserted per check and never deleted for mods missing from a response,
//! so partial results survive restarts. A transport or parse failure aborts
//! only the remote portion; previously cached annotations stay served and
//! the persisted file is left untouched.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CompatibilityStatus};
use crate::game::GameDetails;
use crate::jsonc;
use crate::version;

/// Default endpoint of the compatibility index.
pub const DEFAULT_ENDPOINT: &str = "https://api.granary-mods.net/v1/mods";

const USER_AGENT: &str = concat!("Granary/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "1.0";

/// Last-known remote data for one mod.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCacheEntry {
    pub unique_id: String,
    #[serde(default)]
    pub suggested_version: Option<String>,
    #[serde(default)]
    pub status: CompatibilityStatus,
    #[serde(default)]
    pub link: Option<String>,
}

/// The persisted update cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCache {
    #[serde(default)]
    pub last_runtime_utc: Option<DateTime<Utc>>,
    /// Loader version the cached verdicts were obtained under. A different
    /// live loader invalidates them.
    #[serde(default)]
    pub launcher_version: Option<String>,
    #[serde(default)]
    pub mods: Vec<UpdateCacheEntry>,
}

impl UpdateCache {
    /// Load the cache file. Absence or corruption yields an empty cache;
    /// this never fails an update check.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => return UpdateCache::default(),
        };
        match jsonc::from_str_lenient(&text) {
            Ok(cache) => cache,
            Err(err) => {
                tracing::warn!("discarding corrupt update cache {:?}: {}", path, err);
                UpdateCache::default()
            }
        }
    }

    /// Rewrite the whole cache file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir {:?}", parent))?;
        }
        let raw = serde_json::to_string_pretty(self).context("serialize update cache")?;
        fs::write(path, raw).with_context(|| format!("write update cache {:?}", path))?;
        Ok(())
    }

    pub fn entry(&self, unique_id: &str) -> Option<&UpdateCacheEntry> {
        self.mods
            .iter()
            .find(|e| e.unique_id.eq_ignore_ascii_case(unique_id))
    }

    /// Add the entry, or overwrite the fields of an existing one matched by
    /// unique id. Entries are never removed here.
    pub fn upsert(&mut self, entry: UpdateCacheEntry) {
        match self
            .mods
            .iter_mut()
            .find(|e| e.unique_id.eq_ignore_ascii_case(&entry.unique_id))
        {
            Some(existing) => *existing = entry,
            None => self.mods.push(entry),
        }
    }
}

/// One mod's slot in the batched remote query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModQueryEntry {
    pub id: String,
    pub update_keys: Vec<String>,
    pub installed_version: Option<String>,
}

/// The batched remote query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuery {
    pub mods: Vec<ModQueryEntry>,
    pub include_extended_metadata: bool,
    pub api_version: String,
    pub game_version: String,
    pub platform: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestedUpdate {
    pub version: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVersionInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<RemoteVersionInfo>,
    #[serde(default)]
    pub unofficial: Option<RemoteVersionInfo>,
    #[serde(default)]
    pub custom_url: Option<String>,
    #[serde(default)]
    pub compatibility_status: Option<CompatibilityStatus>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// One entry of the remote response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModQueryResult {
    pub id: String,
    #[serde(default)]
    pub suggested_update: Option<SuggestedUpdate>,
    #[serde(default)]
    pub metadata: Option<RemoteMetadata>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// What one check accomplished.
#[derive(Debug)]
pub struct CheckOutcome {
    /// Mods for which a strictly newer version was recorded.
    pub updates_available: usize,
    /// True when no remote query was issued (in-flight guard or transport
    /// failure) and annotations came from the cache alone.
    pub cache_only: bool,
    /// User-visible failure of the remote portion, if any.
    pub remote_error: Option<String>,
}

/// Drives update checks. At most one live check runs at a time; a check
/// requested while one is in flight degrades to a cache-only probe.
pub struct UpdateChecker {
    endpoint: String,
    checking: AtomicBool,
}

impl Default for UpdateChecker {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl UpdateChecker {
    pub fn new(endpoint: impl Into<String>) -> Self {
        UpdateChecker {
            endpoint: endpoint.into(),
            checking: AtomicBool::new(false),
        }
    }

    /// Whether a live check is currently in flight.
    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::SeqCst)
    }

    /// Annotate the catalog from the persisted cache without any remote
    /// traffic.
    pub fn check_cache_only(&self, catalog: &mut Catalog, cache_path: &Path) -> CheckOutcome {
        let cache = UpdateCache::load(cache_path);
        let updates_available = annotate_from_cache(catalog, &cache);
        CheckOutcome {
            updates_available,
            cache_only: true,
            remote_error: None,
        }
    }

    /// Run a full update check: load the cache, query the remote index,
    /// resolve each result onto the catalog, merge into the cache and
    /// persist it. On transport or parse failure the remote portion is
    /// aborted, cached annotations are served instead and the persisted
    /// file is left exactly as it was.
    pub fn check(
        &self,
        catalog: &mut Catalog,
        cache_path: &Path,
        details: &GameDetails,
    ) -> Result<CheckOutcome> {
        // The guard must be taken before the first suspension point and is
        // released on every exit path below. A second caller arriving while
        // it is held gets a cache-only probe and must not clear it.
        if self.checking.swap(true, Ordering::SeqCst) {
            tracing::debug!("update check already in flight, serving cache");
            return Ok(self.check_cache_only(catalog, cache_path));
        }
        let _guard = CheckingGuard(&self.checking);

        let mut cache = UpdateCache::load(cache_path);
        invalidate_if_launcher_updated(&mut cache, details);
        let query = build_query(catalog, details);
        let results = match self.post_query(&query) {
            Ok(results) => results,
            Err(err) => {
                tracing::warn!("update check failed: {:#}", err);
                let updates_available = annotate_from_cache(catalog, &cache);
                return Ok(CheckOutcome {
                    updates_available,
                    cache_only: true,
                    remote_error: Some(format!("{err:#}")),
                });
            }
        };

        let updates_available = resolve_results(catalog, &results, &mut cache);
        cache.last_runtime_utc = Some(Utc::now());
        if !details.launcher_version.trim().is_empty() {
            cache.launcher_version = Some(details.launcher_version.clone());
        }
        if let Err(err) = cache.save(cache_path) {
            tracing::warn!("failed to persist update cache: {:#}", err);
        }

        Ok(CheckOutcome {
            updates_available,
            cache_only: false,
            remote_error: None,
        })
    }

    fn post_query(&self, query: &UpdateQuery) -> Result<Vec<ModQueryResult>> {
        let response = ureq::post(&self.endpoint)
            .set("User-Agent", USER_AGENT)
            .send_json(query)
            .context("update query failed")?;
        response
            .into_json()
            .context("failed to parse update response")
    }

    #[cfg(test)]
    fn force_checking(&self, value: bool) {
        self.checking.store(value, Ordering::SeqCst);
    }
}

struct CheckingGuard<'a>(&'a AtomicBool);

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drop cached verdicts obtained under a different loader version; they
/// describe compatibility with a loader that is no longer running.
fn invalidate_if_launcher_updated(cache: &mut UpdateCache, details: &GameDetails) {
    let Some(stored) = cache.launcher_version.as_deref() else {
        return;
    };
    if details.has_launcher_updated(stored) {
        tracing::info!(
            "loader updated ({} -> {}), discarding cached verdicts",
            stored,
            details.launcher_version
        );
        cache.mods.clear();
        cache.last_runtime_utc = None;
    }
}

/// Build the batched query for every catalog mod plus the ids of
/// required-but-missing dependencies (the remote can resolve their display
/// names even though nothing is installed under them).
pub fn build_query(catalog: &Catalog, details: &GameDetails) -> UpdateQuery {
    let mut mods: Vec<ModQueryEntry> = Vec::with_capacity(catalog.len());
    let mut seen: Vec<String> = Vec::new();

    for entry in &catalog.mods {
        seen.push(entry.unique_id.to_lowercase());
        mods.push(ModQueryEntry {
            id: entry.unique_id.clone(),
            update_keys: entry.update_keys.clone(),
            installed_version: entry
                .version
                .is_valid()
                .then(|| entry.version.raw().to_string()),
        });
    }

    for entry in &catalog.mods {
        for missing_id in entry.missing_required_ids() {
            let key = missing_id.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            mods.push(ModQueryEntry {
                id: missing_id.to_string(),
                update_keys: Vec::new(),
                installed_version: None,
            });
        }
    }

    // The loader's own version is the API context the remote keys its
    // compatibility verdicts on; the constant is only a fallback for
    // machines with no loader log.
    let api_version = if details.launcher_version.trim().is_empty() {
        API_VERSION.to_string()
    } else {
        details.launcher_version.clone()
    };

    UpdateQuery {
        mods,
        include_extended_metadata: true,
        api_version,
        game_version: details.game_version.clone(),
        platform: details.operating_system.label().to_string(),
    }
}

/// Annotate catalog mods from cache entries alone. Returns how many mods
/// have a strictly newer cached suggestion.
pub fn annotate_from_cache(catalog: &mut Catalog, cache: &UpdateCache) -> usize {
    let mut updates = 0;
    for entry in &mut catalog.mods {
        let Some(cached) = cache.entry(&entry.unique_id) else {
            continue;
        };
        if cached.status != CompatibilityStatus::Unknown {
            entry.compatibility_status = cached.status;
        }
        match &cached.suggested_version {
            Some(suggested) if version::is_outdated(&entry.version, suggested) => {
                entry.suggested_version = Some(suggested.clone());
                entry.update_link = cached.link.clone();
                updates += 1;
            }
            _ => {}
        }
    }
    updates
}

/// Fold remote results onto the catalog and merge them into the cache.
/// Returns the number of mods with a strictly newer suggested version.
pub fn resolve_results(
    catalog: &mut Catalog,
    results: &[ModQueryResult],
    cache: &mut UpdateCache,
) -> usize {
    let mut updates = 0;

    for result in results {
        for error in &result.errors {
            tracing::debug!("remote reported for {}: {}", result.id, error);
        }

        let metadata = result.metadata.as_ref();
        let status = metadata.and_then(|m| m.compatibility_status);
        let page_link = metadata.and_then(|m| {
            m.custom_url
                .clone()
                .or_else(|| m.main.as_ref().and_then(|v| v.url.clone()))
        });

        cache.upsert(UpdateCacheEntry {
            unique_id: result.id.clone(),
            suggested_version: result
                .suggested_update
                .as_ref()
                .map(|u| u.version.clone()),
            status: status.unwrap_or_default(),
            link: result
                .suggested_update
                .as_ref()
                .and_then(|u| u.url.clone())
                .or_else(|| page_link.clone()),
        });

        let Some(entry) = catalog.find_mut(&result.id) else {
            // A looked-up missing requirement; it is cached above so a later
            // install can resolve its name offline, but annotates nothing.
            continue;
        };

        if let Some(name) = metadata.and_then(|m| m.name.clone()) {
            if entry.name.is_empty() {
                entry.name = name;
            }
        }
        if entry.page_link.is_none() {
            entry.page_link = page_link.clone();
        }

        match &result.suggested_update {
            Some(update) if version::is_outdated(&entry.version, &update.version) => {
                entry.suggested_version = Some(update.version.clone());
                entry.update_link = update.url.clone();
                if let Some(status) = status {
                    entry.compatibility_status = status;
                }
                updates += 1;
            }
            _ => match status {
                Some(status) if status.is_alert() => {
                    // A compatibility problem without implying an update.
                    entry.compatibility_status = status;
                    entry.suggested_version = None;
                    entry.update_link = None;
                }
                _ => {
                    // Clear any previous alert.
                    entry.suggested_version = None;
                    entry.update_link = None;
                    entry.compatibility_status = status.unwrap_or(CompatibilityStatus::Ok);
                }
            },
        }
    }

    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::{make_catalog, make_mod};
    use crate::game::OperatingSystem;

    fn details() -> GameDetails {
        GameDetails {
            game_version: "1.6.0".into(),
            launcher_version: "4.0.0".into(),
            operating_system: OperatingSystem::Linux,
        }
    }

    fn result(id: &str, suggested: Option<(&str, &str)>, status: Option<CompatibilityStatus>) -> ModQueryResult {
        ModQueryResult {
            id: id.to_string(),
            suggested_update: suggested.map(|(version, url)| SuggestedUpdate {
                version: version.to_string(),
                url: Some(url.to_string()),
            }),
            metadata: status.map(|status| RemoteMetadata {
                compatibility_status: Some(status),
                ..Default::default()
            }),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_cache_load_absent_or_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.json");
        assert!(UpdateCache::load(&path).mods.is_empty());

        std::fs::write(&path, "{{{{").unwrap();
        assert!(UpdateCache::load(&path).mods.is_empty());
    }

    #[test]
    fn test_cache_upsert_and_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.json");

        let mut cache = UpdateCache::default();
        cache.upsert(UpdateCacheEntry {
            unique_id: "a.alpha".into(),
            suggested_version: Some("1.1.0".into()),
            status: CompatibilityStatus::Ok,
            link: None,
        });
        cache.upsert(UpdateCacheEntry {
            unique_id: "A.ALPHA".into(),
            suggested_version: Some("1.2.0".into()),
            status: CompatibilityStatus::Ok,
            link: None,
        });
        assert_eq!(cache.mods.len(), 1);
        cache.save(&path).unwrap();

        let reloaded = UpdateCache::load(&path);
        assert_eq!(
            reloaded.entry("a.alpha").unwrap().suggested_version.as_deref(),
            Some("1.2.0")
        );
    }

    #[test]
    fn test_build_query_includes_missing_requirements() {
        let mut alpha = make_mod("a.alpha", &[("ghost.dep", true), ("b.beta", true)]);
        alpha.update_keys = vec!["Nexus:1401".into()];
        let catalog = make_catalog(vec![alpha, make_mod("b.beta", &[])]);

        let query = build_query(&catalog, &details());
        assert!(query.include_extended_metadata);
        assert_eq!(query.game_version, "1.6.0");
        assert_eq!(query.platform, "Linux");

        let ids: Vec<&str> = query.mods.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a.alpha", "b.beta", "ghost.dep"]);
        assert_eq!(query.mods[0].update_keys, vec!["Nexus:1401"]);
        assert_eq!(query.mods[0].installed_version.as_deref(), Some("1.0.0"));
        assert_eq!(query.mods[2].installed_version, None);
    }

    #[test]
    fn test_build_query_carries_launcher_version() {
        let catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        let query = build_query(&catalog, &details());
        assert_eq!(query.api_version, "4.0.0");

        let query = build_query(&catalog, &GameDetails::unknown());
        assert_eq!(query.api_version, API_VERSION);
    }

    #[test]
    fn test_launcher_update_discards_cached_verdicts() {
        let mut cache = UpdateCache::default();
        cache.launcher_version = Some("3.9.0".into());
        cache.last_runtime_utc = Some(Utc::now());
        cache.upsert(UpdateCacheEntry {
            unique_id: "a.alpha".into(),
            suggested_version: Some("1.2.0".into()),
            status: CompatibilityStatus::Ok,
            link: None,
        });

        invalidate_if_launcher_updated(&mut cache, &details());
        assert!(cache.mods.is_empty());
        assert_eq!(cache.last_runtime_utc, None);
    }

    #[test]
    fn test_same_or_unknown_launcher_keeps_cached_verdicts() {
        let mut cache = UpdateCache::default();
        cache.launcher_version = Some("4.0.0".into());
        cache.upsert(UpdateCacheEntry {
            unique_id: "a.alpha".into(),
            suggested_version: Some("1.2.0".into()),
            status: CompatibilityStatus::Ok,
            link: None,
        });

        // Same loader as last time.
        invalidate_if_launcher_updated(&mut cache, &details());
        assert_eq!(cache.mods.len(), 1);

        // No loader log at all: nothing to compare against, keep the data.
        invalidate_if_launcher_updated(&mut cache, &GameDetails::unknown());
        assert_eq!(cache.mods.len(), 1);

        // A cache written before versions were recorded is never discarded.
        cache.launcher_version = None;
        invalidate_if_launcher_updated(&mut cache, &details());
        assert_eq!(cache.mods.len(), 1);
    }

    #[test]
    fn test_resolve_records_update() {
        let mut catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        let mut cache = UpdateCache::default();
        let results = vec![result(
            "A.Alpha",
            Some(("1.2.0", "https://mods.example/a")),
            None,
        )];

        let updates = resolve_results(&mut catalog, &results, &mut cache);
        assert_eq!(updates, 1);

        let entry = catalog.find("a.alpha").unwrap();
        assert_eq!(entry.suggested_version.as_deref(), Some("1.2.0"));
        assert_eq!(entry.update_link.as_deref(), Some("https://mods.example/a"));
        assert_eq!(
            cache.entry("a.alpha").unwrap().suggested_version.as_deref(),
            Some("1.2.0")
        );
    }

    #[test]
    fn test_resolve_equal_version_is_not_an_update() {
        let mut catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        let mut cache = UpdateCache::default();
        let results = vec![result("a.alpha", Some(("1.0.0", "url")), None)];

        let updates = resolve_results(&mut catalog, &results, &mut cache);
        assert_eq!(updates, 0);
        let entry = catalog.find("a.alpha").unwrap();
        assert_eq!(entry.suggested_version, None);
        assert_eq!(entry.compatibility_status, CompatibilityStatus::Ok);
    }

    #[test]
    fn test_resolve_status_without_update() {
        let mut catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        let mut cache = UpdateCache::default();
        let results = vec![result("a.alpha", None, Some(CompatibilityStatus::Broken))];

        let updates = resolve_results(&mut catalog, &results, &mut cache);
        assert_eq!(updates, 0);
        let entry = catalog.find("a.alpha").unwrap();
        assert_eq!(entry.compatibility_status, CompatibilityStatus::Broken);
        assert_eq!(entry.suggested_version, None);
    }

    #[test]
    fn test_resolve_clears_previous_alert() {
        let mut catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        catalog.find_mut("a.alpha").unwrap().suggested_version = Some("9.9.9".into());
        catalog.find_mut("a.alpha").unwrap().compatibility_status = CompatibilityStatus::Broken;

        let mut cache = UpdateCache::default();
        let results = vec![result("a.alpha", None, Some(CompatibilityStatus::Ok))];
        resolve_results(&mut catalog, &results, &mut cache);

        let entry = catalog.find("a.alpha").unwrap();
        assert_eq!(entry.compatibility_status, CompatibilityStatus::Ok);
        assert_eq!(entry.suggested_version, None);
        assert_eq!(entry.update_link, None);
    }

    #[test]
    fn test_resolve_never_deletes_cache_entries() {
        let mut catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        let mut cache = UpdateCache::default();
        cache.upsert(UpdateCacheEntry {
            unique_id: "other.mod".into(),
            suggested_version: Some("2.0.0".into()),
            status: CompatibilityStatus::Ok,
            link: None,
        });

        let results = vec![result("a.alpha", None, None)];
        resolve_results(&mut catalog, &results, &mut cache);
        assert!(cache.entry("other.mod").is_some());
        assert!(cache.entry("a.alpha").is_some());
    }

    #[test]
    fn test_resolve_caches_uninstalled_lookup() {
        let mut catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        let mut cache = UpdateCache::default();
        let results = vec![result("ghost.dep", Some(("3.0.0", "url")), None)];

        let updates = resolve_results(&mut catalog, &results, &mut cache);
        assert_eq!(updates, 0);
        assert!(cache.entry("ghost.dep").is_some());
    }

    #[test]
    fn test_annotate_from_cache() {
        let mut outdated = make_mod("a.alpha", &[]);
        outdated.version = crate::version::ModVersion::parse("1.0.0");
        let mut invalid = make_mod("b.beta", &[]);
        invalid.version = crate::version::ModVersion::parse("not a version");
        let mut catalog = make_catalog(vec![outdated, invalid]);

        let mut cache = UpdateCache::default();
        for id in ["a.alpha", "b.beta"] {
            cache.upsert(UpdateCacheEntry {
                unique_id: id.into(),
                suggested_version: Some("1.2.0".into()),
                status: CompatibilityStatus::Ok,
                link: Some("url".into()),
            });
        }

        let updates = annotate_from_cache(&mut catalog, &cache);
        assert_eq!(updates, 1);
        assert_eq!(
            catalog.find("a.alpha").unwrap().suggested_version.as_deref(),
            Some("1.2.0")
        );
        // Ordering is undefined for the invalid local version.
        assert_eq!(catalog.find("b.beta").unwrap().suggested_version, None);
    }

    #[test]
    fn test_failed_check_leaves_cache_file_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.json");
        let mut cache = UpdateCache::default();
        cache.upsert(UpdateCacheEntry {
            unique_id: "a.alpha".into(),
            suggested_version: Some("1.2.0".into()),
            status: CompatibilityStatus::Ok,
            link: None,
        });
        cache.save(&path).unwrap();
        let before = std::fs::read(&path).unwrap();

        let checker = UpdateChecker::new("not a valid endpoint");
        let mut catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        let outcome = checker.check(&mut catalog, &path, &details()).unwrap();

        assert!(outcome.cache_only);
        assert!(outcome.remote_error.is_some());
        // Cached annotations are still served.
        assert_eq!(outcome.updates_available, 1);
        // And the persisted cache is byte-for-byte unchanged.
        assert_eq!(std::fs::read(&path).unwrap(), before);
        // The guard never sticks.
        assert!(!checker.is_checking());
    }

    #[test]
    fn test_check_while_checking_degrades_to_cache_probe() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.json");
        let mut cache = UpdateCache::default();
        cache.upsert(UpdateCacheEntry {
            unique_id: "a.alpha".into(),
            suggested_version: Some("2.0.0".into()),
            status: CompatibilityStatus::Ok,
            link: None,
        });
        cache.save(&path).unwrap();

        let checker = UpdateChecker::new("not a valid endpoint");
        checker.force_checking(true);

        let mut catalog = make_catalog(vec![make_mod("a.alpha", &[])]);
        let outcome = checker.check(&mut catalog, &path, &details()).unwrap();
        assert!(outcome.cache_only);
        assert!(outcome.remote_error.is_none());
        assert_eq!(outcome.updates_available, 1);
        // The probe must not clear the in-flight guard.
        assert!(checker.is_checking());
    }
}
