//! Elevated operation executors.
//!
//! The session only ever touches the target through [`ElevatedOps`]. Each
//! method is a single call of the underlying facility and either fully
//! succeeds or fully fails.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::common::Mode;
use crate::error::EditError;
use crate::fsx as fs;

/// The four capabilities the editor needs on a file it may not own.
pub trait ElevatedOps {
    /// Read the permission bits of `path`.
    fn read_mode(&self, path: &Path) -> Result<Mode, EditError>;

    /// Stream the content of `path` into `sink`, returning the byte count.
    ///
    /// Failures writing to `sink` come back as [`EditError::Io`]; only the
    /// reading side is a privilege failure.
    fn read_content(&self, path: &Path, sink: &mut dyn Write) -> Result<u64, EditError>;

    /// Overwrite `to` in place with the content of `from`.
    fn write_content(&self, from: &Path, to: &Path) -> Result<(), EditError>;

    /// Set the permission bits of `path`.
    fn write_mode(&self, path: &Path, mode: Mode) -> Result<(), EditError>;
}

/// Runs coreutils behind a privilege prefix such as `sudo` or `doas`.
///
/// An empty prefix runs the tools directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SudoExecutor {
    prefix: Vec<String>,
}

impl SudoExecutor {
    pub fn new(prefix: Vec<String>) -> Self {
        Self { prefix }
    }

    /// Splits a prefix like `"sudo -n"` on whitespace.
    pub fn from_prefix(prefix: &str) -> Self {
        Self::new(prefix.split_whitespace().map(str::to_owned).collect())
    }

    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    fn command(&self, tool: &str) -> Command {
        let mut cmd = match self.prefix.split_first() {
            Some((program, args)) => {
                let mut cmd = Command::new(program);
                cmd.args(args).arg(tool);
                cmd
            }
            None => Command::new(tool),
        };
        cmd.stdin(Stdio::null());
        cmd
    }

    fn run(&self, op: &'static str, path: &Path, tool: &str, args: &[OsString]) -> Result<Output, EditError> {
        debug!(op, path = %path.display(), prefix = ?self.prefix, "running elevated command");
        let output = self
            .command(tool)
            .args(args)
            .output()
            .map_err(|e| spawn_failure(op, path, &e))?;
        check_status(op, path, &output.status, &output.stderr)?;
        Ok(output)
    }
}

impl Default for SudoExecutor {
    fn default() -> Self {
        Self::new(vec!["sudo".to_string()])
    }
}

impl ElevatedOps for SudoExecutor {
    fn read_mode(&self, path: &Path) -> Result<Mode, EditError> {
        let output = self.run(
            "stat",
            path,
            "stat",
            &["-L".into(), "-c".into(), "%a".into(), "--".into(), path.into()],
        )?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.parse::<Mode>().map_err(|detail| EditError::Privilege {
            op: "stat",
            path: path.to_path_buf(),
            detail,
        })
    }

    fn read_content(&self, path: &Path, sink: &mut dyn Write) -> Result<u64, EditError> {
        debug!(op = "cat", path = %path.display(), prefix = ?self.prefix, "running elevated command");
        let mut child = self
            .command("cat")
            .arg("--")
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_failure("cat", path, &e))?;

        let copied = match child.stdout.take() {
            Some(mut stdout) => copy_into(&mut stdout, sink),
            None => Ok(0),
        };
        if let Err(CopyError::Sink(e)) = copied {
            // cat would die of SIGPIPE and hide the real cause.
            let _ = child.kill();
            let _ = child.wait();
            return Err(EditError::Io(e));
        }
        let output = child.wait_with_output().map_err(|e| spawn_failure("cat", path, &e))?;
        check_status("cat", path, &output.status, &output.stderr)?;
        copied.map_err(|e| e.into_edit_error("cat", path))
    }

    fn write_content(&self, from: &Path, to: &Path) -> Result<(), EditError> {
        self.run("cp", to, "cp", &["--".into(), from.into(), to.into()])?;
        Ok(())
    }

    fn write_mode(&self, path: &Path, mode: Mode) -> Result<(), EditError> {
        let octal = format!("{:04o}", mode.bits());
        self.run("chmod", path, "chmod", &["--".into(), octal.into(), path.into()])?;
        Ok(())
    }
}

/// Performs the same operations with the invoking user's own rights.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExecutor;

impl ElevatedOps for DirectExecutor {
    fn read_mode(&self, path: &Path) -> Result<Mode, EditError> {
        debug!(op = "stat", path = %path.display(), "direct");
        fs::unix_permissions(path).map_err(|e| io_failure("stat", path, e))
    }

    fn read_content(&self, path: &Path, sink: &mut dyn Write) -> Result<u64, EditError> {
        debug!(op = "read", path = %path.display(), "direct");
        let mut file = fs::File::open(path).map_err(|e| io_failure("read", path, e))?;
        copy_into(&mut file, sink).map_err(|e| e.into_edit_error("read", path))
    }

    fn write_content(&self, from: &Path, to: &Path) -> Result<(), EditError> {
        debug!(op = "write", path = %to.display(), "direct");
        let mut source = fs::File::open(from).map_err(|e| io_failure("write", from, e))?;
        // Truncate in place so the inode, owner and group survive.
        let mut target = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(to)
            .map_err(|e| io_failure("write", to, e))?;
        io::copy(&mut source, &mut target).map_err(|e| io_failure("write", to, e))?;
        target.sync_all().map_err(|e| io_failure("write", to, e))
    }

    fn write_mode(&self, path: &Path, mode: Mode) -> Result<(), EditError> {
        debug!(op = "chmod", path = %path.display(), %mode, "direct");
        fs::set_unix_permissions(path, mode).map_err(|e| io_failure("chmod", path, e))
    }
}

/// Which side of a copy failed.
#[derive(Debug)]
enum CopyError {
    Source(io::Error),
    Sink(io::Error),
}

impl CopyError {
    fn into_edit_error(self, op: &'static str, path: &Path) -> EditError {
        match self {
            CopyError::Source(e) => io_failure(op, path, e),
            CopyError::Sink(e) => EditError::Io(e),
        }
    }
}

/// `io::copy` that keeps track of which side failed.
fn copy_into(source: &mut dyn Read, sink: &mut dyn Write) -> Result<u64, CopyError> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Source(e)),
        };
        sink.write_all(&buf[..n]).map_err(CopyError::Sink)?;
        total += n as u64;
    }
    Ok(total)
}

fn spawn_failure(op: &'static str, path: &Path, err: &io::Error) -> EditError {
    EditError::Privilege {
        op,
        path: path.to_path_buf(),
        detail: format!("could not run command: {err}"),
    }
}

fn io_failure(op: &'static str, path: &Path, err: io::Error) -> EditError {
    EditError::Privilege {
        op,
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}

fn check_status(
    op: &'static str,
    path: &Path,
    status: &std::process::ExitStatus,
    stderr: &[u8],
) -> Result<(), EditError> {
    if status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    let detail = if stderr.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {stderr}")
    };
    Err(EditError::Privilege {
        op,
        path: path.to_path_buf(),
        detail,
    })
}
