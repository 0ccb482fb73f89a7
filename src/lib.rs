//! # privedit
//!
//! Edit a file you cannot write directly. privedit copies the target into a
//! world-writable staging file, hands that file to you (or to an editor),
//! and writes the result back with elevated privilege, restoring the
//! target's original permission bits.
//!
//! ## Key Modules
//!
//! - [`session`]: the `Start → Staged → AwaitingEdit → Committing → Done` state machine.
//! - [`executor`]: the four elevated operations, behind `sudo`-style prefixes or `std::fs`.
//! - [`staging`]: allocation and guaranteed removal of the staging copy.
//! - [`handoff`]: the continuation signal (Enter key or editor exit).
//! - [`cleanup`]: removal of staging copies when the process is signalled.
//!
//! ## Examples
//!
//! ```no_run
//! use privedit::executor::SudoExecutor;
//! use privedit::handoff::PromptContinuation;
//! use privedit::session::EditSession;
//!
//! let ops = SudoExecutor::default();
//! let mut prompt = PromptContinuation::stdio();
//! let report = EditSession::new(&ops, &mut prompt, std::env::temp_dir())
//!     .run(&[std::path::PathBuf::from("/etc/hosts")])?;
//! println!("restored mode {}", report.mode);
//! # Ok::<(), privedit::EditError>(())
//! ```

pub mod cli;
pub mod cli_runner;
pub mod common;
pub mod config;
pub mod error;
pub use error::EditError;

pub mod cleanup;
pub mod executor;
pub mod handoff;
pub mod report;
pub mod session;
pub mod staging;

pub mod logging;

// Permission-bit helpers
pub mod fsx;
