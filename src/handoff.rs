//! Hand-off to the editing actor and the continuation signal.
//!
//! The session blocks inside [`Continuation::wait`] until the operator says
//! editing is done. There is no timeout.

use std::io::{BufRead, Write};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicI32, Ordering};

use tracing::{debug, info};

use crate::error::EditError;

/// Source of the continuation signal.
pub trait Continuation {
    /// Announce `staging` and block until editing is complete.
    ///
    /// `target` is only used for messages.
    fn wait(&mut self, staging: &Path, target: &Path) -> Result<(), EditError>;
}

/// Prints the staging path and waits for one line of input.
pub struct PromptContinuation<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptContinuation<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptContinuation<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Prompt on the process's own stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Continuation for PromptContinuation<R, W> {
    fn wait(&mut self, staging: &Path, target: &Path) -> Result<(), EditError> {
        writeln!(self.output, "Edit {} by changing:", target.display())?;
        writeln!(self.output, "  {}", staging.display())?;
        write!(self.output, "Press Enter when done... ")?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read == 0 {
            writeln!(self.output)?;
            return Err(EditError::Aborted {
                target: target.to_path_buf(),
            });
        }
        debug!("continuation received");
        Ok(())
    }
}

/// Pid of the editor currently running, 0 when there is none.
static EDITOR_PID: AtomicI32 = AtomicI32::new(0);

/// Whether an [`EditorContinuation`] is waiting on its editor right now.
pub fn editor_running() -> bool {
    EDITOR_PID.load(Ordering::SeqCst) > 0
}

/// Send SIGTERM to the running editor, if any.
pub fn terminate_editor() -> bool {
    let pid = EDITOR_PID.swap(0, Ordering::SeqCst);
    if pid <= 0 {
        return false;
    }
    debug!(pid, "terminating editor");
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

/// Runs an editor on the staging copy; its successful exit is the signal.
///
/// The command goes through `sh -c` with the staging path as `$1`, so
/// values such as `code --wait` or `vim -u NONE` work as-is. The staging
/// path is printed to `output` first so it can be found outside the editor.
pub struct EditorContinuation<W> {
    command: String,
    output: W,
}

impl<W: Write> EditorContinuation<W> {
    pub fn new(command: impl Into<String>, output: W) -> Self {
        Self {
            command: command.into(),
            output,
        }
    }

    fn failure(&self, detail: String) -> EditError {
        EditError::Editor {
            command: self.command.clone(),
            detail,
        }
    }
}

impl EditorContinuation<std::io::Stdout> {
    /// Announce on the process's own stdout.
    pub fn stdio(command: impl Into<String>) -> Self {
        Self::new(command, std::io::stdout())
    }
}

impl<W: Write> Continuation for EditorContinuation<W> {
    fn wait(&mut self, staging: &Path, target: &Path) -> Result<(), EditError> {
        writeln!(self.output, "Editing {} via", target.display())?;
        writeln!(self.output, "  {}", staging.display())?;
        self.output.flush()?;

        info!(editor = %self.command, target = %target.display(), staging = %staging.display(), "launching editor");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(format!("{} \"$@\"", self.command))
            .arg("privedit-editor")
            .arg(staging)
            .spawn()
            .map_err(|e| self.failure(e.to_string()))?;

        EDITOR_PID.store(child.id() as i32, Ordering::SeqCst);
        let status = {
            let _running = scopeguard::guard((), |_| EDITOR_PID.store(0, Ordering::SeqCst));
            child.wait()
        };
        let status = status.map_err(|e| self.failure(e.to_string()))?;
        if !status.success() {
            return Err(self.failure(status.to_string()));
        }
        Ok(())
    }
}
