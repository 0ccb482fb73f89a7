//! Resolved run configuration.
//!
//! Every setting follows the same priority: command-line flag, then the
//! `PRIVEDIT_*` environment variable (handled by clap), then a default.

use std::path::PathBuf;

use crate::cli::Args;
use crate::executor::{DirectExecutor, ElevatedOps, SudoExecutor};
use crate::handoff::{Continuation, EditorContinuation, PromptContinuation};

/// How elevated operations are carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elevation {
    /// Run coreutils behind a prefix (possibly empty).
    Prefix(SudoExecutor),
    /// Use the invoking user's rights through `std::fs`.
    Direct,
}

/// Where the continuation signal comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    Prompt,
    Editor(String),
}

#[derive(Debug, Clone)]
pub struct EditConfig {
    /// Positional arguments as given; counted by the session.
    pub paths: Vec<PathBuf>,
    pub elevation: Elevation,
    pub scratch_dir: PathBuf,
    pub handoff: Handoff,
    pub json: bool,
    /// Positive for `-v`, negative for `-q`.
    pub verbosity: i8,
}

impl EditConfig {
    pub fn from_args(args: &Args) -> Self {
        let elevation = if args.no_elevate {
            Elevation::Direct
        } else {
            Elevation::Prefix(SudoExecutor::from_prefix(&args.elevate))
        };
        let handoff = match args.editor.as_deref().map(str::trim) {
            Some(cmd) if !cmd.is_empty() => Handoff::Editor(cmd.to_string()),
            _ => Handoff::Prompt,
        };
        let verbosity = (args.verbose.min(3) as i8) - (args.quiet.min(2) as i8);

        Self {
            paths: args.paths.clone(),
            elevation,
            scratch_dir: args.scratch_dir.clone().unwrap_or_else(std::env::temp_dir),
            handoff,
            json: args.json,
            verbosity,
        }
    }

    pub fn executor(&self) -> Box<dyn ElevatedOps> {
        match &self.elevation {
            Elevation::Prefix(sudo) => Box::new(sudo.clone()),
            Elevation::Direct => Box::new(DirectExecutor),
        }
    }

    pub fn continuation(&self) -> Box<dyn Continuation> {
        match &self.handoff {
            Handoff::Prompt => Box::new(PromptContinuation::stdio()),
            Handoff::Editor(cmd) => Box::new(EditorContinuation::stdio(cmd.clone())),
        }
    }
}
