use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in the `privedit` crate.
///
/// Every variant is fatal to a single run. Nothing is retried; the operator
/// re-invokes the tool.
#[derive(Debug, Error)]
pub enum EditError {
    /// The tool was invoked with the wrong number of positional arguments.
    #[error("usage: privedit [OPTIONS] <PATH> (expected exactly one path, got {got})")]
    Usage { got: usize },

    /// The target path does not exist.
    #[error("'{}' does not exist", path.display())]
    NotFound { path: PathBuf },

    /// An elevated operation was denied or failed.
    #[error("elevated {op} on '{}' failed: {detail}", path.display())]
    Privilege {
        op: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// The staging copy could not be allocated or prepared.
    #[error("could not prepare staging copy in '{}': {source}", dir.display())]
    Resource {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operator input closed before the continuation signal arrived.
    #[error("input closed before editing was confirmed; '{}' left untouched", target.display())]
    Aborted { target: PathBuf },

    /// The editor process could not be run or exited unsuccessfully.
    #[error("editor '{command}' failed: {detail}")]
    Editor { command: String, detail: String },

    /// An I/O error on the invoking side (terminal, staging file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditError {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            EditError::Usage { .. } => 2,
            EditError::NotFound { .. } => 3,
            EditError::Privilege { .. } => 4,
            EditError::Resource { .. } => 5,
            EditError::Aborted { .. } => 6,
            EditError::Editor { .. } => 7,
            EditError::Io(_) => 1,
        }
    }
}
