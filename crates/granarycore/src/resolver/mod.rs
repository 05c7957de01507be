//! Dependency resolution and enable/disable cascades.
//!
//! Enabling a mod drags its required, installed dependencies along
//! (forward edges); disabling a mod drags everything that requires it
//! (reverse edges). Both traversals are depth-first with an explicit
//! visited set keyed by lowercased unique id, so cyclic requirement graphs
//! terminate: a cycle is a graph property the cascade is safe against, not
//! an error. Because the entry mod is visited first and never revisited, it
//! always ends in its explicit target state even when a cycle re-enters it.
//!
//! These functions (plus profile application) are the only sanctioned
//! mutators of the `enabled` flag; bulk operations delegate to the per-mod
//! primitives so partial states stay consistent.

use std::collections::HashSet;

use crate::catalog::Catalog;

/// Observer invoked once per mod whose enabled flag actually changed,
/// with the mod's unique id and its new state.
pub type EnabledObserver<'a> = &'a mut dyn FnMut(&str, bool);

/// Recompute every requirement's `is_missing`/`is_hard` against current
/// catalog membership. Must run after any rebuild or mod add/remove; the
/// flags are views, not authoritative state.
pub fn compute_requirements(catalog: &mut Catalog) {
    let present: HashSet<String> = catalog
        .mods
        .iter()
        .map(|m| m.unique_id.to_lowercase())
        .collect();

    for entry in &mut catalog.mods {
        for req in &mut entry.requirements {
            req.is_missing = !present.contains(&req.required_id.to_lowercase());
            req.is_hard = req.is_required && !req.is_missing;
        }
    }
}

/// Enable a mod and, transitively, every required dependency present in the
/// catalog. A mod already enabled is left alone but still cascades, since a
/// dependency may have been disabled out from under it by external state.
pub fn enable(catalog: &mut Catalog, unique_id: &str) {
    enable_with_observer(catalog, unique_id, &mut |_, _| {});
}

pub fn enable_with_observer(catalog: &mut Catalog, unique_id: &str, observer: EnabledObserver) {
    let mut visited = HashSet::new();
    enable_inner(catalog, unique_id, &mut visited, observer);
}

fn enable_inner(
    catalog: &mut Catalog,
    unique_id: &str,
    visited: &mut HashSet<String>,
    observer: EnabledObserver,
) {
    if !visited.insert(unique_id.to_lowercase()) {
        return;
    }
    let Some(index) = catalog.position(unique_id) else {
        return;
    };

    if !catalog.mods[index].enabled {
        catalog.mods[index].enabled = true;
        let id = catalog.mods[index].unique_id.clone();
        tracing::debug!("enabled {}", id);
        observer(&id, true);
    }

    let required: Vec<String> = catalog.mods[index]
        .requirements
        .iter()
        .filter(|req| req.is_required)
        .map(|req| req.required_id.clone())
        .collect();
    for dep_id in required {
        enable_inner(catalog, &dep_id, visited, observer);
    }
}

/// Disable a mod and, transitively, every catalog mod that requires it.
pub fn disable(catalog: &mut Catalog, unique_id: &str) {
    disable_with_observer(catalog, unique_id, &mut |_, _| {});
}

pub fn disable_with_observer(catalog: &mut Catalog, unique_id: &str, observer: EnabledObserver) {
    let mut visited = HashSet::new();
    disable_inner(catalog, unique_id, &mut visited, observer);
}

fn disable_inner(
    catalog: &mut Catalog,
    unique_id: &str,
    visited: &mut HashSet<String>,
    observer: EnabledObserver,
) {
    if !visited.insert(unique_id.to_lowercase()) {
        return;
    }
    let Some(index) = catalog.position(unique_id) else {
        return;
    };

    if catalog.mods[index].enabled {
        catalog.mods[index].enabled = false;
        let id = catalog.mods[index].unique_id.clone();
        tracing::debug!("disabled {}", id);
        observer(&id, false);
    }

    // Reverse edges: every mod whose required-dependency set names this one.
    let target_id = catalog.mods[index].unique_id.clone();
    let dependents: Vec<String> = catalog
        .mods
        .iter()
        .filter(|m| {
            m.requirements
                .iter()
                .any(|req| req.is_required && req.required_id.eq_ignore_ascii_case(&target_id))
        })
        .map(|m| m.unique_id.clone())
        .collect();
    for dependent_id in dependents {
        disable_inner(catalog, &dependent_id, visited, observer);
    }
}

/// Enable every mod in the catalog, one cascade per mod.
pub fn enable_all(catalog: &mut Catalog) {
    for id in id_list(catalog) {
        enable(catalog, &id);
    }
}

/// Disable every mod in the catalog, one cascade per mod.
pub fn disable_all(catalog: &mut Catalog) {
    for id in id_list(catalog) {
        disable(catalog, &id);
    }
}

fn id_list(catalog: &Catalog) -> Vec<String> {
    catalog.mods.iter().map(|m| m.unique_id.clone()).collect()
}
