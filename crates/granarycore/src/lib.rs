//! Core engine for Granary, a mod manager for a moddable game.
//!
//! The engine owns everything between "a directory full of mod folders" and
//! "a launcher-ready view of the enabled set":
//! - discovering installed mods from their `manifest.json` descriptors
//! - resolving inter-mod requirements and cascading enable/disable decisions
//! - persisting named profiles (sets of enabled mod ids)
//! - reconciling local state against the remote compatibility index, with a
//!   persisted cache for offline reuse
//! - materializing the enabled set as a directory of links consumed by the
//!   external launcher
//!
//! Front ends (the CLI in `granarycli`) stay thin: they wire these modules
//! together in the conventional cascade → capture → materialize → launch
//! sequence and own process-level concerns such as log subscribers.

pub mod catalog;
pub mod deploy;
pub mod game;
pub mod jsonc;
pub mod launcher;
pub mod manifest;
pub mod paths;
pub mod profile;
pub mod resolver;
pub mod update;
pub mod version;

pub use catalog::{Catalog, CompatibilityStatus, Mod, Requirement};
pub use manifest::{Manifest, ManifestError};
pub use profile::Profile;
pub use update::{UpdateCache, UpdateCacheEntry, UpdateChecker};
pub use version::ModVersion;
