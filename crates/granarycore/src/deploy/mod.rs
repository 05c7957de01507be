//! Folder materialization.
//!
//! The launcher consumes a single directory whose entries are links back to
//! each enabled mod's real install location. Materialization rebuilds that
//! directory from scratch on every run: clear the whole subtree (failed
//! prior runs can leave real copies behind, not just dangling links), then
//! realize one link per enabled mod.
//!
//! Link creation goes through external shell commands batched under a
//! command-line length ceiling. A batch that fails is logged verbatim with
//! the arguments that produced it and the remaining batches still run.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::catalog::Catalog;

/// Ceiling for a single external command line. Windows `cmd.exe` rejects
/// lines past 8191 characters; staying under 8000 leaves headroom for the
/// interpreter's own argv entry.
pub const MAX_COMMAND_LENGTH: usize = 8_000;

/// Path length past which Windows requires the verbatim prefix.
const WINDOWS_PATH_CEILING: usize = 260;

/// One link to realize: `link` is created inside the target directory and
/// points at `target`, a mod's install location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPair {
    pub link: PathBuf,
    pub target: PathBuf,
}

/// Capability for turning link pairs into real filesystem entries.
///
/// Kept behind a trait so the materialization walk stays independent of the
/// platform mechanism (symlink vs. directory junction).
pub trait LinkBackend {
    /// Realize every pair in the batch. The batch is sized so a single
    /// external invocation can carry it.
    fn realize(&self, batch: &[LinkPair]) -> Result<()>;
}

/// What one materialization run accomplished.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Links handed to a backend batch that completed.
    pub linked: usize,
    /// Total batches issued.
    pub batches: usize,
    /// Batches whose backend invocation failed.
    pub failed_batches: usize,
}

impl MaterializeReport {
    pub fn is_complete(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Rebuild `target_dir` to contain exactly one link per enabled mod.
///
/// The directory is created if absent and its previous contents are removed
/// wholesale first. A failed batch is logged and counted in the report but
/// does not abort the remaining batches.
pub fn materialize(
    catalog: &Catalog,
    target_dir: &Path,
    backend: &dyn LinkBackend,
) -> Result<MaterializeReport> {
    fs::create_dir_all(target_dir)
        .with_context(|| format!("create mods directory {:?}", target_dir))?;
    clear_directory(target_dir)?;

    let pairs: Vec<LinkPair> = catalog
        .enabled_mods()
        .into_iter()
        .map(|entry| LinkPair {
            link: target_dir.join(entry.folder_name()),
            target: entry.install_location.clone(),
        })
        .collect();

    let mut report = MaterializeReport::default();
    for batch in pack_batches(&pairs, MAX_COMMAND_LENGTH) {
        report.batches += 1;
        match backend.realize(batch) {
            Ok(()) => report.linked += batch.len(),
            Err(err) => {
                tracing::warn!("link batch failed: {:#}", err);
                report.failed_batches += 1;
            }
        }
    }

    tracing::info!(
        "materialized {} links into {:?} ({} batches, {} failed)",
        report.linked,
        target_dir,
        report.batches,
        report.failed_batches
    );
    Ok(report)
}

/// Delete every entry under `dir`, recursing into directories. The
/// directory itself survives.
pub fn clear_directory(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {:?}", dir))? {
        let entry = entry?;
        let path = entry.path();
        // symlink_metadata so a link to a directory is unlinked, not
        // traversed into the mod's real files.
        let metadata = fs::symlink_metadata(&path)?;
        if metadata.is_dir() {
            fs::remove_dir_all(&path).with_context(|| format!("remove {:?}", path))?;
        } else {
            fs::remove_file(&path).with_context(|| format!("remove {:?}", path))?;
        }
    }
    Ok(())
}

/// Split pairs into consecutive batches whose estimated command length each
/// stays under `limit`. A single pair that alone exceeds the limit still
/// gets its own batch; the backend surfaces the OS error if it truly cannot
/// run.
pub fn pack_batches(pairs: &[LinkPair], limit: usize) -> Vec<&[LinkPair]> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut length = 0;

    for (index, pair) in pairs.iter().enumerate() {
        let cost = command_cost(pair);
        if index > start && length + cost > limit {
            batches.push(&pairs[start..index]);
            start = index;
            length = 0;
        }
        length += cost;
    }
    if start < pairs.len() {
        batches.push(&pairs[start..]);
    }
    batches
}

/// Estimated command-line contribution of one pair: both quoted paths plus
/// the link keyword and separator.
fn command_cost(pair: &LinkPair) -> usize {
    let link = pair.link.to_string_lossy().len();
    let target = pair.target.to_string_lossy().len();
    link + target + 32
}

/// Apply the Windows verbatim prefix to paths past the legacy ceiling.
/// Already-prefixed and relative paths pass through untouched.
fn escape_long_path(path: &Path) -> String {
    let raw = path.to_string_lossy().into_owned();
    if cfg!(windows)
        && raw.len() >= WINDOWS_PATH_CEILING
        && !raw.starts_with(r"\\?\")
        && path.is_absolute()
    {
        format!(r"\\?\{raw}")
    } else {
        raw
    }
}

/// Realizes links by spawning the platform shell: `mklink /J` directory
/// junctions through `cmd.exe` on Windows, `ln -sfn` through `sh` elsewhere.
#[derive(Debug, Default)]
pub struct CommandLinkBackend;

impl CommandLinkBackend {
    fn script(batch: &[LinkPair]) -> String {
        let separator = if cfg!(windows) { " & " } else { " && " };
        batch
            .iter()
            .map(|pair| {
                let link = quote(&escape_long_path(&pair.link));
                let target = quote(&escape_long_path(&pair.target));
                if cfg!(windows) {
                    format!("mklink /J {link} {target}")
                } else {
                    format!("ln -sfn {target} {link}")
                }
            })
            .collect::<Vec<_>>()
            .join(separator)
    }
}

fn quote(raw: &str) -> String {
    format!("\"{raw}\"")
}

impl LinkBackend for CommandLinkBackend {
    fn realize(&self, batch: &[LinkPair]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let script = Self::script(batch);

        let output = if cfg!(windows) {
            Command::new("cmd").args(["/C", &script]).output()
        } else {
            Command::new("sh").args(["-c", &script]).output()
        }
        .context("spawn link command")?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::warn!("link command reported: {}\nscript: {}", stderr.trim(), script);
        }
        if !output.status.success() {
            anyhow::bail!("link command exited with {}: {}", output.status, script);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::{make_catalog, make_mod};
    use crate::resolver;
    use std::sync::Mutex;

    /// Records batches instead of touching the filesystem.
    #[derive(Default)]
    struct RecordingBackend {
        batches: Mutex<Vec<Vec<LinkPair>>>,
        fail_first: bool,
    }

    impl LinkBackend for RecordingBackend {
        fn realize(&self, batch: &[LinkPair]) -> Result<()> {
            let mut batches = self.batches.lock().unwrap();
            let failing = self.fail_first && batches.is_empty();
            batches.push(batch.to_vec());
            if failing {
                anyhow::bail!("simulated failure");
            }
            Ok(())
        }
    }

    /// Creates plain directories so the result is observable without
    /// symlink support.
    struct DirBackend;

    impl LinkBackend for DirBackend {
        fn realize(&self, batch: &[LinkPair]) -> Result<()> {
            for pair in batch {
                std::fs::create_dir_all(&pair.link)?;
            }
            Ok(())
        }
    }

    fn pair(name: &str) -> LinkPair {
        LinkPair {
            link: PathBuf::from(format!("/game/Mods/{name}")),
            target: PathBuf::from(format!("/library/{name}")),
        }
    }

    #[test]
    fn test_pack_batches_respects_limit() {
        let pairs: Vec<LinkPair> = (0..40).map(|i| pair(&format!("mod-{i:02}"))).collect();
        let limit = 300;
        let batches = pack_batches(&pairs, limit);

        assert!(batches.len() >= 2);
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), pairs.len());
        for batch in &batches {
            let length: usize = batch.iter().map(command_cost).sum();
            assert!(length <= limit);
        }
    }

    #[test]
    fn test_pack_batches_oversized_pair_gets_own_batch() {
        let huge = LinkPair {
            link: PathBuf::from(format!("/game/Mods/{}", "x".repeat(500))),
            target: PathBuf::from("/library/x"),
        };
        let pairs = [pair("a"), huge.clone(), pair("b")];
        let batches = pack_batches(&pairs, 200);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1], &[huge][..]);
    }

    #[test]
    fn test_pack_batches_empty() {
        assert!(pack_batches(&[], 100).is_empty());
    }

    #[test]
    fn test_materialize_replaces_stale_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("Mods");
        std::fs::create_dir_all(target.join("m3/nested")).unwrap();
        std::fs::write(target.join("m3/nested/file.txt"), "stale").unwrap();

        let mut catalog = make_catalog(vec![
            make_mod("m1", &[]),
            make_mod("m2", &[]),
            make_mod("m3", &[]),
        ]);
        resolver::enable(&mut catalog, "m1");
        resolver::enable(&mut catalog, "m2");

        let report = materialize(&catalog, &target, &DirBackend).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.linked, 2);

        let mut entries: Vec<String> = std::fs::read_dir(&target)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["m1", "m2"]);
    }

    #[test]
    fn test_materialize_failed_batch_does_not_abort_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("Mods");

        // Folder names long enough that each pair fills a batch on its own.
        let mods: Vec<_> = (0..6)
            .map(|i| make_mod(&format!("mod-{i}-{}", "x".repeat(4_200)), &[]))
            .collect();
        let mut catalog = make_catalog(mods);
        resolver::enable_all(&mut catalog);

        let backend = RecordingBackend {
            fail_first: true,
            ..Default::default()
        };
        std::fs::create_dir_all(&target).unwrap();
        let report = materialize(&catalog, &target, &backend).unwrap();

        let batches = backend.batches.lock().unwrap();
        assert!(batches.len() >= 2);
        assert_eq!(report.batches, batches.len());
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.linked + batches[0].len(), 6);
    }

    #[test]
    fn test_script_shape() {
        let script = CommandLinkBackend::script(&[pair("a"), pair("b")]);
        if cfg!(windows) {
            assert!(script.contains("mklink /J"));
            assert!(script.contains(" & "));
        } else {
            assert!(script.contains("ln -sfn"));
            assert!(script.contains(" && "));
        }
        assert!(script.contains("/game/Mods/a"));
        assert!(script.contains("/library/b"));
    }
}
