//! Fully resolved process descriptors
//!
//! A `Runnable` is ready to launch: argv, working directory, environment
//! overrides and extra `PATH` entries have all been decided. It renders
//! itself into a `std::process::Command` and into a shell-like string for
//! the live view and error messages.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

/// A process which can be run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Runnable {
    /// Resolved argv; never empty
    pub args: Vec<String>,
    /// Working directory (absolute once run context is applied)
    pub cwd: Option<PathBuf>,
    /// Environment overrides applied on top of the parent environment
    pub env: BTreeMap<String, String>,
    /// Extra directories prepended to `PATH`
    pub path: Vec<PathBuf>,
}

impl Runnable {
    /// Create a runnable from argv alone
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    /// Return a copy with an extra `PATH` entry prepended
    pub fn with_path_entry(mut self, entry: PathBuf) -> Self {
        self.path.insert(0, entry);
        self
    }

    /// Render into spawn arguments
    ///
    /// The parent environment is inherited; `path` entries are absolutized
    /// and prepended to `PATH`, then `env` overrides are applied on top.
    /// The base environment is never replaced wholesale.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.args[0]);
        command.args(&self.args[1..]);

        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        if !self.path.is_empty() {
            let mut entries: Vec<String> = self
                .path
                .iter()
                .map(|p| absolutize(p).display().to_string())
                .collect();
            if let Ok(existing) = std::env::var("PATH") {
                entries.push(existing);
            }
            command.env("PATH", entries.join(":"));
        }

        command.envs(&self.env);
        command
    }
}

fn absolutize(path: &PathBuf) -> PathBuf {
    if path.is_absolute() {
        path.clone()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.clone())
    }
}

impl fmt::Display for Runnable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = shlex::try_join(self.args.iter().map(String::as_str))
            .unwrap_or_else(|_| self.args.join(" "));
        write!(f, "{rendered}")
    }
}
