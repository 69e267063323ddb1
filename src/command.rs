//! Command templates for benchmark pipelines
//!
//! A `CommandInfo` is an executable command template: argv, environment
//! overrides and an optional working directory. In definition files it can
//! be written either as a bare string (shell-split exactly once, when the
//! definition is loaded) or as an object with `command`/`env`/`workdir`
//! keys. Once stored, argv is never re-split.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::runnable::Runnable;

/// An executable command template from a benchmark definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CommandRepr", into = "CommandRepr")]
pub struct CommandInfo {
    /// Command argv; never empty
    pub command: Vec<String>,
    /// Environment additions/overrides (not a full environment)
    pub env: BTreeMap<String, String>,
    /// Working directory, relative to the benchmark dir unless absolute
    pub workdir: Option<String>,
}

impl CommandInfo {
    /// Create a command from pre-split argv
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            env: BTreeMap::new(),
            workdir: None,
        }
    }

    /// Return a new command with `args` appended and `env` merged
    ///
    /// The original is left untouched. Used to splice preset arguments onto
    /// the last run command of a pipeline.
    pub fn extend(
        &self,
        args: &[String],
        env: &BTreeMap<String, String>,
        workdir: Option<String>,
    ) -> CommandInfo {
        let mut command = self.command.clone();
        command.extend(args.iter().cloned());

        let mut merged = self.env.clone();
        merged.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));

        CommandInfo {
            command,
            env: merged,
            workdir: workdir.or_else(|| self.workdir.clone()),
        }
    }

    /// Convert into a bare `Runnable` (no run context applied yet)
    pub fn into_runnable(&self) -> Runnable {
        Runnable {
            args: self.command.clone(),
            cwd: self.workdir.clone().map(Into::into),
            env: self.env.clone(),
            path: Vec::new(),
        }
    }
}

/// Shell-split a command line into argv
///
/// Fails on unbalanced quotes and on lines that split to nothing.
pub fn split_args(line: &str) -> Result<Vec<String>, String> {
    match shlex::split(line) {
        Some(args) if !args.is_empty() => Ok(args),
        Some(_) => Err("command must not be empty".into()),
        None => Err(format!("cannot shell-split command line: {line:?}")),
    }
}

/// Argv in a definition file: a string to be shell-split or a preserved list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ArgvRepr {
    Line(String),
    List(Vec<String>),
}

impl ArgvRepr {
    pub(crate) fn into_args(self) -> Result<Vec<String>, String> {
        match self {
            ArgvRepr::Line(line) => split_args(&line),
            ArgvRepr::List(args) if !args.is_empty() => Ok(args),
            ArgvRepr::List(_) => Err("command must not be empty".into()),
        }
    }
}

/// JSON representation of a command: bare string or full object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CommandRepr {
    Line(String),
    Full {
        command: ArgvRepr,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir: Option<String>,
    },
}

impl TryFrom<CommandRepr> for CommandInfo {
    type Error = String;

    fn try_from(repr: CommandRepr) -> Result<Self, Self::Error> {
        match repr {
            CommandRepr::Line(line) => Ok(CommandInfo::new(split_args(&line)?)),
            CommandRepr::Full {
                command,
                env,
                workdir,
            } => Ok(CommandInfo {
                command: command.into_args()?,
                env,
                workdir,
            }),
        }
    }
}

impl From<CommandInfo> for CommandRepr {
    fn from(info: CommandInfo) -> Self {
        CommandRepr::Full {
            command: ArgvRepr::List(info.command),
            env: info.env,
            workdir: info.workdir,
        }
    }
}
