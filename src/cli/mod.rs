use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "privedit", author, version, about, long_about = None)]
pub struct Args {
    /// The file to edit. Exactly one path is accepted.
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Privilege prefix placed in front of stat/cat/cp/chmod (e.g. "sudo -n", "doas"). An empty value runs them directly.
    #[arg(long, env = "PRIVEDIT_ELEVATE", default_value = "sudo")]
    pub elevate: String,

    /// Do not elevate at all; read and write the target with your own rights.
    #[arg(long)]
    pub no_elevate: bool,

    /// Directory for the staging copy. Defaults to the system temp directory.
    #[arg(long, env = "PRIVEDIT_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Run this editor on the staging copy instead of waiting for Enter.
    #[arg(long, env = "PRIVEDIT_EDITOR")]
    pub editor: Option<String>,

    /// Print a JSON report of the edit on success.
    #[arg(long)]
    pub json: bool,

    /// More log output on stderr (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output on stderr (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,
}

/// Parses command-line arguments using `clap`.
///
/// Help and version requests come back as a `clap::Error` too; the caller
/// prints them and uses their exit code.
pub fn parse() -> Result<Args, clap::Error> {
    Args::try_parse()
}
