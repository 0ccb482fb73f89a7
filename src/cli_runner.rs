//! CLI runner shared by the `privedit` binary and integration tests.
//!
//! The edit session itself is synchronous and may block on the operator for
//! as long as it likes. It runs on a tokio blocking thread while the async
//! side waits for either its result or a termination signal. On a signal
//! the editor is stopped and every registered staging copy is deleted before
//! the process exits. SIGINT is ignored while an editor owns the terminal.

use std::io::{self, Write};

use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, warn};

use crate::cleanup::{self, Registry};
use crate::cli::Args;
use crate::config::EditConfig;
use crate::error::EditError;
use crate::handoff;
use crate::logging;
use crate::report::EditReport;
use crate::session::{EditSession, SharedState, State};

/// How a run ended when it did not fail.
#[derive(Debug)]
pub enum Outcome {
    Edited(EditReport),
    /// Terminated by `signal`; staging copies were removed.
    Interrupted { signal: i32 },
}

impl Outcome {
    /// Process exit code, `128 + signo` for signals like a shell reports.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Edited(_) => 0,
            Outcome::Interrupted { signal } => (128 + signal) as u8,
        }
    }
}

/// Public entry for running CLI logic.
pub fn run_cli_app(args: &Args) -> Result<Outcome, EditError> {
    let config = EditConfig::from_args(args);
    logging::init(config.verbosity);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(supervise(config.clone()));
    // The session thread may still be blocked on stdin after a signal.
    runtime.shutdown_background();

    if let Ok(Outcome::Edited(report)) = &result {
        print_success(&config, report)?;
    }
    result
}

async fn supervise(config: EditConfig) -> Result<Outcome, EditError> {
    let mut signals = TerminationSignals::install()?;
    let state = SharedState::new();
    let session_state = state.clone();
    let mut session = tokio::task::spawn_blocking(move || run_session(&config, session_state));

    loop {
        tokio::select! {
            joined = &mut session => return match joined {
                Ok(result) => result.map(Outcome::Edited),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => Err(EditError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))),
            },
            (name, signo) = signals.recv() => {
                if signo == libc::SIGINT && handoff::editor_running() {
                    // The editor shares the terminal and handles ^C itself.
                    debug!(signal = name, "ignored while the editor runs");
                    continue;
                }
                if handoff::terminate_editor() {
                    debug!(signal = name, "editor terminated");
                }
                return Ok(interrupt(name, signo, state.load(), cleanup::global()));
            }
        }
    }
}

/// Drop every staging copy after a termination signal.
fn interrupt(name: &'static str, signo: i32, state: State, registry: &Registry) -> Outcome {
    let removed = registry.remove_all();
    match state {
        State::Committing => {
            warn!(signal = name, removed, %state, "terminated while committing, the target may be incomplete")
        }
        State::Done => warn!(signal = name, removed, %state, "terminated after the edit was committed"),
        _ => warn!(signal = name, removed, %state, "terminated before the edit was committed"),
    }
    Outcome::Interrupted { signal: signo }
}

fn run_session(config: &EditConfig, state: SharedState) -> Result<EditReport, EditError> {
    let ops = config.executor();
    let mut continuation = config.continuation();
    let mut session = EditSession::new(ops.as_ref(), continuation.as_mut(), &config.scratch_dir)
        .with_shared_state(state);
    let result = session.run(&config.paths);
    let session_state = session.state();
    if let Err(e) = &result {
        debug!(error = %e, state = %session_state, "edit failed");
    }
    result
}

fn print_success(config: &EditConfig, report: &EditReport) -> Result<(), EditError> {
    let mut stdout = io::stdout().lock();
    if config.json {
        let json = report.to_json().map_err(io::Error::from)?;
        writeln!(stdout, "{json}")?;
    } else {
        writeln!(
            stdout,
            "Updated {} ({} bytes, mode {})",
            report.target.display(),
            report.bytes_written,
            report.mode
        )?;
    }
    Ok(())
}

/// SIGINT, SIGTERM and SIGHUP listeners.
struct TerminationSignals {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

impl TerminationSignals {
    fn install() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) -> (&'static str, i32) {
        tokio::select! {
            _ = self.interrupt.recv() => ("SIGINT", libc::SIGINT),
            _ = self.terminate.recv() => ("SIGTERM", libc::SIGTERM),
            _ = self.hangup.recv() => ("SIGHUP", libc::SIGHUP),
        }
    }
}
