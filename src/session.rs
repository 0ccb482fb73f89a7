//! The privileged edit state machine.
//!
//! A run moves `Start → Staged → AwaitingEdit → Committing → Done`. The
//! target is read in the first three states and written only while
//! `Committing`. Any error ends the run where it happened; the staging copy
//! is removed on every path out of this module.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cleanup::{self, Registry};
use crate::error::EditError;
use crate::executor::ElevatedOps;
use crate::fsx as fs;
use crate::handoff::Continuation;
use crate::report::EditReport;
use crate::staging::StagingFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Start,
    Staged,
    AwaitingEdit,
    Committing,
    Done,
}

impl State {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => State::Staged,
            2 => State::AwaitingEdit,
            3 => State::Committing,
            4 => State::Done,
            _ => State::Start,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Start => "start",
            State::Staged => "staged",
            State::AwaitingEdit => "awaiting-edit",
            State::Committing => "committing",
            State::Done => "done",
        };
        f.write_str(name)
    }
}

/// A session's current state, readable from another thread.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

pub struct EditSession<'a> {
    ops: &'a dyn ElevatedOps,
    continuation: &'a mut dyn Continuation,
    scratch_dir: PathBuf,
    registry: &'static Registry,
    state: SharedState,
}

impl<'a> EditSession<'a> {
    pub fn new(
        ops: &'a dyn ElevatedOps,
        continuation: &'a mut dyn Continuation,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ops,
            continuation,
            scratch_dir: scratch_dir.into(),
            registry: cleanup::global(),
            state: SharedState::new(),
        }
    }

    /// Track staging copies in `registry` instead of the global one.
    pub fn with_registry(mut self, registry: &'static Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Publish state transitions through `state` as well.
    pub fn with_shared_state(mut self, state: SharedState) -> Self {
        self.state = state;
        self
    }

    /// The state the last run reached.
    pub fn state(&self) -> State {
        self.state.load()
    }

    fn enter(&mut self, next: State) {
        debug!(from = %self.state.load(), to = %next, "session state");
        self.state.store(next);
    }

    /// Edit the single file named in `args`.
    pub fn run(&mut self, args: &[PathBuf]) -> Result<EditReport, EditError> {
        self.state.store(State::Start);
        let started_at = Utc::now();

        let target = validate(args)?;
        let mode = self.ops.read_mode(target)?;
        info!(target = %target.display(), %mode, "captured permissions");

        let staging = StagingFile::create(&self.scratch_dir, target, self.registry)?;
        let bytes_read = self.fill(&staging, target)?;
        self.enter(State::Staged);

        self.enter(State::AwaitingEdit);
        self.continuation.wait(staging.path(), target)?;

        self.enter(State::Committing);
        let bytes_written = fs::metadata(staging.path())?.len();
        self.ops.write_content(staging.path(), target)?;
        self.ops.write_mode(target, mode)?;
        info!(target = %target.display(), bytes = bytes_written, %mode, "committed edit");

        let staging_path = match staging.close() {
            Ok(path) => path,
            Err(e) => {
                // The target is already committed; the drop retried removal.
                warn!(error = %e, "staging copy removal reported an error");
                PathBuf::new()
            }
        };
        self.enter(State::Done);

        Ok(EditReport {
            target: target.to_path_buf(),
            staging: staging_path,
            mode,
            bytes_read,
            bytes_written,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Copy the target into the staging file. Failures on the staging side
    /// are resource errors of the scratch directory.
    fn fill(&self, staging: &StagingFile, target: &Path) -> Result<u64, EditError> {
        let mut file = match staging.open_for_write() {
            Ok(file) => file,
            Err(EditError::Io(e)) => return Err(self.resource(e)),
            Err(e) => return Err(e),
        };
        let n = match self.ops.read_content(target, &mut file) {
            Ok(n) => n,
            Err(EditError::Io(e)) => return Err(self.resource(e)),
            Err(e) => return Err(e),
        };
        file.flush().map_err(|e| self.resource(e))?;
        file.sync_all().map_err(|e| self.resource(e))?;
        debug!(staging = %staging.path().display(), bytes = n, "staging copy populated");
        Ok(n)
    }

    fn resource(&self, source: std::io::Error) -> EditError {
        EditError::Resource {
            dir: self.scratch_dir.clone(),
            source,
        }
    }
}

/// Require exactly one argument naming an existing path.
pub fn validate(args: &[PathBuf]) -> Result<&Path, EditError> {
    let [target] = args else {
        return Err(EditError::Usage { got: args.len() });
    };
    match target.try_exists() {
        Ok(true) => Ok(target),
        Ok(false) => Err(EditError::NotFound { path: target.clone() }),
        Err(e) => {
            // Usually an unreadable parent directory; the elevated stat decides.
            debug!(target = %target.display(), error = %e, "existence check inconclusive");
            Ok(target)
        }
    }
}
