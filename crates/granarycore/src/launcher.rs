//! Starting the external game launcher.
//!
//! The engine's only obligation at launch time is that the materialized
//! directory reflects the enabled set; the launcher finds it through a
//! single environment variable.

use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use anyhow::{Context, Result};

/// Environment variable the launcher reads to locate the active mods
/// directory.
pub const MODS_PATH_ENV: &str = "GRANARY_MODS_PATH";

/// Builder for the launcher invocation.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    executable: PathBuf,
    mods_dir: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl LaunchConfig {
    pub fn new(executable: impl Into<PathBuf>, mods_dir: impl Into<PathBuf>) -> Self {
        LaunchConfig {
            executable: executable.into(),
            mods_dir: mods_dir.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The fully configured command, exposed so callers can inspect or
    /// further adjust it before spawning.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.args(&self.args);
        command.env(MODS_PATH_ENV, &self.mods_dir);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }

    /// Spawn the launcher without waiting for it.
    pub fn spawn(&self) -> Result<Child> {
        tracing::info!("launching {:?} with mods at {:?}", self.executable, self.mods_dir);
        self.command()
            .spawn()
            .with_context(|| format!("failed to launch {:?}", self.executable))
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_command_carries_mods_path() {
        let config = LaunchConfig::new("/games/valley/launcher", "/games/valley/Mods")
            .arg("--skip-intro")
            .working_dir("/games/valley");
        let command = config.command();

        assert_eq!(command.get_program(), OsStr::new("/games/valley/launcher"));
        assert_eq!(
            command.get_args().collect::<Vec<_>>(),
            vec![OsStr::new("--skip-intro")]
        );
        let env: Vec<_> = command.get_envs().collect();
        assert!(env.contains(&(OsStr::new(MODS_PATH_ENV), Some(OsStr::new("/games/valley/Mods")))));
        assert_eq!(
            command.get_current_dir(),
            Some(Path::new("/games/valley"))
        );
    }
}
