#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

const ENV_VARS: [&str; 4] = ["PRIVEDIT_EDITOR", "PRIVEDIT_ELEVATE", "PRIVEDIT_LOG", "PRIVEDIT_SCRATCH_DIR"];

fn privedit(scratch: &Path) -> Command {
    let mut cmd = Command::cargo_bin("privedit").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--scratch-dir").arg(scratch);
    cmd
}

fn demo_conf(dir: &TempDir, mode: u32, content: &str) -> PathBuf {
    let path = dir.path().join("demo.conf");
    fs::write(&path, content).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    path
}

fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode() & 0o7777
}

fn is_empty(dir: &TempDir) -> bool {
    fs::read_dir(dir.path()).unwrap().next().is_none()
}

#[test]
fn editor_changes_content_and_mode_is_kept() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let scratch = tempdir()?;
    let target = demo_conf(&work, 0o640, "A");

    privedit(scratch.path())
        .arg("--no-elevate")
        .arg("--editor")
        .arg("chmod 600 \"$1\" && printf B >")
        .arg(&target)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Updated")
                .and(predicate::str::contains("mode 640"))
                .and(predicate::str::contains("privedit-"))
                .and(predicate::str::contains(scratch.path().to_string_lossy().as_ref())),
        );

    assert_eq!(fs::read_to_string(&target)?, "B");
    assert_eq!(mode_of(&target), 0o640);
    assert!(is_empty(&scratch));
    Ok(())
}

#[test]
fn prompt_shows_staging_path_and_commits_on_enter() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let scratch = tempdir()?;
    let target = demo_conf(&work, 0o644, "listen_addresses = 'localhost'\n");

    privedit(scratch.path())
        .arg("--no-elevate")
        .arg(&target)
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("privedit-")
                .and(predicate::str::contains("Press Enter"))
                .and(predicate::str::contains(scratch.path().to_string_lossy().as_ref())),
        );

    assert_eq!(fs::read_to_string(&target)?, "listen_addresses = 'localhost'\n");
    assert_eq!(mode_of(&target), 0o644);
    assert!(is_empty(&scratch));
    Ok(())
}

#[test]
fn bare_coreutils_with_json_report() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let scratch = tempdir()?;
    let target = demo_conf(&work, 0o640, "host all all 127.0.0.1/32 md5\n");

    let output = privedit(scratch.path())
        .arg("--elevate")
        .arg("")
        .arg("--editor")
        .arg("printf 'host all all 0.0.0.0/0 md5\\n' >")
        .arg("--json")
        .arg(&target)
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["mode"], "640");
    assert_eq!(report["bytes_written"], 27);
    assert_eq!(report["target"], target.to_string_lossy().as_ref());
    assert_eq!(fs::read_to_string(&target)?, "host all all 0.0.0.0/0 md5\n");
    assert_eq!(mode_of(&target), 0o640);
    assert!(is_empty(&scratch));
    Ok(())
}

#[test]
fn wrong_argument_count_is_usage_error() {
    let work = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let target = demo_conf(&work, 0o644, "A");

    privedit(scratch.path())
        .arg("--no-elevate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("usage"));

    privedit(scratch.path())
        .arg("--no-elevate")
        .arg(&target)
        .arg(&target)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("got 2"));

    assert!(is_empty(&scratch));
    assert_eq!(fs::read_to_string(&target).unwrap(), "A");
}

#[test]
fn missing_target_is_not_found() {
    let work = tempdir().unwrap();
    let scratch = tempdir().unwrap();

    privedit(scratch.path())
        .arg("--no-elevate")
        .arg(work.path().join("demo.conf"))
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("does not exist"));

    assert!(is_empty(&scratch));
}

#[test]
fn closed_stdin_aborts_without_commit() {
    let work = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let target = demo_conf(&work, 0o640, "A");

    privedit(scratch.path())
        .arg("--no-elevate")
        .arg(&target)
        .write_stdin("")
        .assert()
        .code(6);

    assert_eq!(fs::read_to_string(&target).unwrap(), "A");
    assert_eq!(mode_of(&target), 0o640);
    assert!(is_empty(&scratch));
}

#[test]
fn failing_editor_aborts_without_commit() {
    let work = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let target = demo_conf(&work, 0o640, "A");

    privedit(scratch.path())
        .arg("--no-elevate")
        .arg("--editor")
        .arg("printf B > \"$1\"; exit 3;")
        .arg(&target)
        .assert()
        .code(7)
        .stderr(predicate::str::contains("editor"));

    assert_eq!(fs::read_to_string(&target).unwrap(), "A");
    assert!(is_empty(&scratch));
}

#[test]
fn denied_elevation_is_privilege_error() {
    let work = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let target = demo_conf(&work, 0o640, "A");

    privedit(scratch.path())
        .arg("--elevate")
        .arg("false")
        .arg(&target)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("elevated stat"));

    assert_eq!(fs::read_to_string(&target).unwrap(), "A");
    assert!(is_empty(&scratch));
}

fn spawn_privedit(scratch: &Path, args: &[&OsStr]) -> std::io::Result<Child> {
    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin("privedit"));
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--scratch-dir")
        .arg(scratch)
        .arg("--no-elevate")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

fn wait_for(what: &str, mut ready: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !ready() {
        assert!(Instant::now() < deadline, "{what} never appeared");
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn send(child: &Child, signo: libc::c_int) {
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, signo) };
    assert_eq!(rc, 0);
}

/// Deliver `signo` while the prompt waits and check nothing is left behind.
fn assert_signal_removes_staging_copy(signo: libc::c_int) -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let scratch = tempdir()?;
    let target = demo_conf(&work, 0o640, "secret");

    let mut child = spawn_privedit(scratch.path(), &[target.as_os_str()])?;
    wait_for("staging copy", || !is_empty(&scratch));
    // Give the copy a moment to be populated and the prompt to block.
    std::thread::sleep(Duration::from_millis(200));

    send(&child, signo);
    let status = child.wait()?;

    assert_eq!(status.code(), Some(128 + signo));
    assert!(is_empty(&scratch), "staging copy left behind");
    assert_eq!(fs::read_to_string(&target)?, "secret");
    assert_eq!(mode_of(&target), 0o640);
    Ok(())
}

#[test]
fn sigterm_while_waiting_removes_staging_copy() -> Result<(), Box<dyn std::error::Error>> {
    assert_signal_removes_staging_copy(libc::SIGTERM)
}

#[test]
fn sigint_while_waiting_removes_staging_copy() -> Result<(), Box<dyn std::error::Error>> {
    assert_signal_removes_staging_copy(libc::SIGINT)
}

#[test]
fn sighup_while_waiting_removes_staging_copy() -> Result<(), Box<dyn std::error::Error>> {
    assert_signal_removes_staging_copy(libc::SIGHUP)
}

#[test]
fn sigint_while_editor_runs_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let scratch = tempdir()?;
    let target = demo_conf(&work, 0o640, "A");
    let started = work.path().join("editor-started");
    let editor = format!("touch '{}' && sleep 1 && printf B >", started.display());

    let mut child = spawn_privedit(scratch.path(), &[OsStr::new("--editor"), OsStr::new(&editor), target.as_os_str()])?;
    wait_for("editor", || started.exists());
    std::thread::sleep(Duration::from_millis(100));

    send(&child, libc::SIGINT);
    let status = child.wait()?;

    assert!(status.success(), "{status}");
    assert_eq!(fs::read_to_string(&target)?, "B");
    assert_eq!(mode_of(&target), 0o640);
    assert!(is_empty(&scratch));
    Ok(())
}

#[test]
fn sigterm_while_editor_runs_stops_it() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let scratch = tempdir()?;
    let target = demo_conf(&work, 0o640, "A");
    let started = work.path().join("editor-started");
    let finished = work.path().join("editor-finished");
    let editor = format!(
        "touch '{}' && sleep 2 && touch '{}' && printf B >",
        started.display(),
        finished.display()
    );

    let mut child = spawn_privedit(scratch.path(), &[OsStr::new("--editor"), OsStr::new(&editor), target.as_os_str()])?;
    wait_for("editor", || started.exists());
    std::thread::sleep(Duration::from_millis(100));

    send(&child, libc::SIGTERM);
    let status = child.wait()?;
    std::thread::sleep(Duration::from_secs(3));

    assert_eq!(status.code(), Some(128 + libc::SIGTERM));
    assert!(!finished.exists(), "editor kept running");
    assert_eq!(fs::read_to_string(&target)?, "A");
    assert!(is_empty(&scratch));
    Ok(())
}
