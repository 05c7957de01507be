//! Command-line front end for the Granary engine.
//!
//! Enabled state is persisted through profiles: every state-changing command
//! loads the selected profile, applies it onto the freshly discovered
//! catalog, performs its cascades, captures the result back and saves the
//! profile. The engine itself keeps no enablement history across runs.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use granarycore::catalog::Catalog;
use granarycore::deploy::{self, CommandLinkBackend};
use granarycore::game::GameDetails;
use granarycore::launcher::LaunchConfig;
use granarycore::paths::ManagerPaths;
use granarycore::profile::{self, Profile};
use granarycore::resolver;
use granarycore::update::{UpdateChecker, DEFAULT_ENDPOINT};

#[derive(Parser)]
#[command(name = "granary", version, about = "Mod enablement and update manager")]
struct Cli {
    /// Game installation directory.
    #[arg(long, env = "GRANARY_GAME_DIR")]
    game_dir: PathBuf,

    /// Manager state directory (profiles, update cache). Defaults to the
    /// platform config directory.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Profile whose enabled set the command operates on.
    #[arg(long, default_value = profile::DEFAULT_PROFILE)]
    profile: String,

    /// Also discover mods inside dot-prefixed directories.
    #[arg(long)]
    include_hidden: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installed mods with their enablement and update status.
    List,
    /// Enable a mod together with its required dependencies.
    Enable { unique_id: String },
    /// Disable a mod together with everything that requires it.
    Disable { unique_id: String },
    /// Show each mod's requirements and whether they are satisfied.
    Requirements,
    /// Manage named profiles.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Query the remote compatibility index and report available updates.
    CheckUpdates {
        /// Serve cached results without any remote traffic.
        #[arg(long)]
        cache_only: bool,
        /// Compatibility index endpoint.
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },
    /// Rebuild the launcher-facing mods directory from the enabled set.
    Deploy,
    /// Deploy, then start the external launcher.
    Launch {
        /// Launcher executable. Defaults to `launcher` inside the game dir.
        #[arg(long)]
        executable: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// List profiles.
    List,
    /// Create an empty profile.
    Create { name: String },
    /// Rename a profile.
    Rename { from: String, to: String },
    /// Delete a profile.
    Delete { name: String },
    /// Apply a profile's enabled set onto the active profile.
    Apply { name: String },
    /// Snapshot the selected profile's current enabled set under a new name.
    Save { name: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let paths = match &cli.state_dir {
        Some(state_dir) => ManagerPaths::with_state_root(&cli.game_dir, state_dir),
        None => ManagerPaths::discover(&cli.game_dir)?,
    };
    paths.ensure_layout()?;

    match &cli.command {
        Command::List => {
            let catalog = load_catalog(&cli, &paths)?;
            for entry in &catalog.mods {
                let marker = if entry.is_enabled() { "*" } else { " " };
                let mut line = format!(
                    "{marker} {} {} ({})",
                    entry.unique_id,
                    entry.version,
                    entry.name
                );
                if let Some(suggested) = &entry.suggested_version {
                    line.push_str(&format!("  update: {suggested}"));
                }
                if entry.compatibility_status.is_alert() {
                    line.push_str(&format!("  [{}]", entry.compatibility_status.label()));
                }
                println!("{line}");
            }
        }
        Command::Enable { unique_id } => {
            with_profile(&cli, &paths, |catalog, _| {
                require_mod(catalog, unique_id)?;
                resolver::enable(catalog, unique_id);
                Ok(())
            })?;
        }
        Command::Disable { unique_id } => {
            with_profile(&cli, &paths, |catalog, _| {
                require_mod(catalog, unique_id)?;
                resolver::disable(catalog, unique_id);
                Ok(())
            })?;
        }
        Command::Requirements => {
            let catalog = load_catalog(&cli, &paths)?;
            for entry in &catalog.mods {
                if entry.requirements.is_empty() {
                    continue;
                }
                println!("{}", entry.unique_id);
                for req in &entry.requirements {
                    let state = if req.is_missing {
                        "missing"
                    } else if req.is_hard {
                        "required"
                    } else {
                        "optional"
                    };
                    println!("  {} ({state})", req.required_id);
                }
            }
        }
        Command::Profile(command) => run_profile_command(&cli, &paths, command)?,
        Command::CheckUpdates {
            cache_only,
            endpoint,
        } => {
            let mut catalog = load_catalog(&cli, &paths)?;
            let checker = UpdateChecker::new(endpoint.clone());
            let cache_path = paths.update_cache_file();

            let outcome = if *cache_only {
                checker.check_cache_only(&mut catalog, &cache_path)
            } else {
                let details = GameDetails::from_log(&paths.loader_log_file())
                    .unwrap_or_else(|err| {
                        tracing::warn!("no loader log, querying without context: {err:#}");
                        GameDetails::unknown()
                    });
                checker.check(&mut catalog, &cache_path, &details)?
            };

            if let Some(error) = &outcome.remote_error {
                eprintln!("update check failed: {error}");
            }
            println!(
                "{} update(s) available{}",
                outcome.updates_available,
                if outcome.cache_only { " (from cache)" } else { "" }
            );
            for entry in &catalog.mods {
                if let Some(suggested) = &entry.suggested_version {
                    let link = entry.update_link.as_deref().unwrap_or("");
                    println!("  {} {} -> {suggested} {link}", entry.unique_id, entry.version);
                }
            }
        }
        Command::Deploy => {
            let catalog = load_catalog(&cli, &paths)?;
            let report = deploy::materialize(
                &catalog,
                &paths.active_mods_dir(),
                &CommandLinkBackend,
            )?;
            println!(
                "linked {} mod(s) into {:?}",
                report.linked,
                paths.active_mods_dir()
            );
            if !report.is_complete() {
                bail!("{} link batch(es) failed", report.failed_batches);
            }
        }
        Command::Launch { executable } => {
            let catalog = load_catalog(&cli, &paths)?;
            let report = deploy::materialize(
                &catalog,
                &paths.active_mods_dir(),
                &CommandLinkBackend,
            )?;
            if !report.is_complete() {
                bail!(
                    "{} link batch(es) failed, not launching",
                    report.failed_batches
                );
            }
            let executable = executable
                .clone()
                .unwrap_or_else(|| paths.game_dir().join("launcher"));
            let child = LaunchConfig::new(executable, paths.active_mods_dir())
                .working_dir(paths.game_dir())
                .spawn()?;
            println!("launcher started (pid {})", child.id());
        }
    }

    Ok(())
}

fn run_profile_command(cli: &Cli, paths: &ManagerPaths, command: &ProfileCommand) -> Result<()> {
    let dir = paths.profiles_dir();
    match command {
        ProfileCommand::List => {
            for profile in profile::load_all(&dir)? {
                let marker = if profile.is_protected { " (protected)" } else { "" };
                println!(
                    "{}{marker}: {} mod(s)",
                    profile.name,
                    profile.enabled_mod_ids.len()
                );
            }
        }
        ProfileCommand::Create { name } => {
            profile::create(&dir, name, Vec::new())?;
            println!("created profile {name}");
        }
        ProfileCommand::Rename { from, to } => {
            profile::rename(&dir, from, to)?;
            println!("renamed profile {from} -> {to}");
        }
        ProfileCommand::Delete { name } => {
            profile::delete(&dir, name)?;
            println!("deleted profile {name}");
        }
        ProfileCommand::Apply { name } => {
            let source = find_profile(paths, name)?;
            with_profile(cli, paths, |catalog, _| {
                source.apply_to_catalog(catalog);
                Ok(())
            })?;
        }
        ProfileCommand::Save { name } => {
            let catalog = load_catalog(cli, paths)?;
            profile::create(&dir, name, profile::capture_from_catalog(&catalog))?;
            println!("saved enabled set of {} as {name}", cli.profile);
        }
    }
    Ok(())
}

/// Discover the catalog and apply the selected profile onto it.
fn load_catalog(cli: &Cli, paths: &ManagerPaths) -> Result<Catalog> {
    let catalog_root = paths.mod_library();
    let mut catalog = Catalog::discover_and_resolve(&catalog_root, !cli.include_hidden)
        .with_context(|| format!("discover mods under {:?}", catalog_root))?;

    profile::ensure_default(&paths.profiles_dir())?;
    let selected = find_profile(paths, &cli.profile)?;
    selected.apply_to_catalog(&mut catalog);
    Ok(catalog)
}

/// Run a cascade against the profile-shaped catalog, then capture the
/// result back into the profile and save it.
fn with_profile<F>(cli: &Cli, paths: &ManagerPaths, mutate: F) -> Result<()>
where
    F: FnOnce(&mut Catalog, &Profile) -> Result<()>,
{
    let mut catalog = load_catalog(cli, paths)?;
    let mut selected = find_profile(paths, &cli.profile)?;

    mutate(&mut catalog, &selected)?;

    selected.capture_from_catalog(&catalog);
    selected.save(&paths.profiles_dir())?;
    println!(
        "profile {}: {} mod(s) enabled",
        selected.name,
        selected.enabled_mod_ids.len()
    );
    Ok(())
}

fn find_profile(paths: &ManagerPaths, name: &str) -> Result<Profile> {
    profile::load_all(&paths.profiles_dir())?
        .into_iter()
        .find(|p| p.name == name)
        .with_context(|| format!("no profile named {name:?}"))
}

fn require_mod(catalog: &Catalog, unique_id: &str) -> Result<()> {
    if !catalog.contains(unique_id) {
        bail!("no installed mod with id {unique_id:?}");
    }
    Ok(())
}
