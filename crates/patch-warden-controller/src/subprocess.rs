// crates/patch-warden-controller/src/subprocess.rs
// ============================================================================
// Module: Confined Subprocess Execution
// Description: Scrubbed-env spawn with capped capture and bounded wait.
// Purpose: Run external commands without inheriting credentials or blocking forever.
// Dependencies: libc, std, thiserror
// ============================================================================

//! ## Overview
//! Commands run with a cleared environment (fixed `PATH`, `HOME` pinned to
//! the working directory, `LC_ALL=C`), stdin closed, and both output streams
//! captured up to a byte cap with an explicit truncation marker. The wait is
//! bounded: on timeout the child receives SIGTERM, then SIGKILL after a
//! grace period. Reader threads drain the pipes fully so a chatty child can
//! never deadlock against a full pipe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::path::Path;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use patch_warden_core::TRUNCATION_MARKER;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed PATH for spawned commands (system defaults only).
const CONFINED_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
/// Poll interval while waiting on a child.
const WAIT_POLL: Duration = Duration::from_millis(25);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Spawn and wait failures.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The program could not be found or started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program name that failed to start.
        program: String,
        /// Underlying error text.
        message: String,
    },
    /// Pipe capture or wait I/O failed.
    #[error("subprocess I/O error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Captured outcome of one confined command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Exit code; -1 when the child died to a signal.
    pub exit_code: i32,
    /// Captured stdout, truncated at the cap.
    pub stdout: String,
    /// Captured stderr, truncated at the cap.
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// True when the wall clock elapsed and the child was terminated.
    pub timed_out: bool,
}

// ============================================================================
// SECTION: Capture
// ============================================================================

/// Drains a pipe on a thread, keeping at most `cap` bytes.
fn capture_stream<R: Read + Send + 'static>(
    mut stream: R,
    cap: usize,
) -> JoinHandle<(Vec<u8>, bool)> {
    thread::spawn(move || {
        let mut kept: Vec<u8> = Vec::new();
        let mut truncated = false;
        let mut buffer = [0u8; 8192];
        loop {
            match stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    if kept.len() < cap {
                        let take = (cap - kept.len()).min(read);
                        kept.extend_from_slice(&buffer[..take]);
                        if take < read {
                            truncated = true;
                        }
                    } else {
                        truncated = true;
                    }
                }
                Err(_) => break,
            }
        }
        (kept, truncated)
    })
}

/// Renders captured bytes, appending the truncation marker when cut.
fn render_capture(handle: JoinHandle<(Vec<u8>, bool)>) -> String {
    let (bytes, truncated) = handle.join().unwrap_or((Vec::new(), false));
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

// ============================================================================
// SECTION: Termination Protocol
// ============================================================================

/// Sends a signal to the child's whole process group.
///
/// Children are spawned as their own group leader, so the negative PID
/// addresses every descendant; stragglers cannot keep the capture pipes
/// open past termination.
fn signal_group(child: &Child, signal: i32) {
    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };
    #[allow(unsafe_code, reason = "Graceful group termination requires raw kill(2) delivery.")]
    // SAFETY: kill(2) with a PID freshly obtained from a still-owned Child
    // cannot touch memory; at worst the group was already reaped and the
    // call returns ESRCH, which is ignored.
    let _ = unsafe { libc::kill(-pid, signal) };
}

/// Sends SIGTERM to the child's group, waits out the grace period, then
/// SIGKILLs the group.
fn terminate_with_grace(child: &mut Child, grace: Duration) {
    signal_group(child, libc::SIGTERM);
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        thread::sleep(WAIT_POLL);
    }
    signal_group(child, libc::SIGKILL);
    let _ = child.wait();
}

// ============================================================================
// SECTION: Confined Run
// ============================================================================

/// Runs a command rooted at `workdir` with a scrubbed environment.
///
/// # Errors
///
/// Returns [`SpawnError::Spawn`] when the program cannot start and
/// [`SpawnError::Io`] when stream setup fails. A timeout is NOT an error; it
/// is reported through [`CommandOutcome::timed_out`].
pub fn run_confined(
    workdir: &Path,
    argv: &[String],
    wall: Duration,
    grace: Duration,
    capture_cap: usize,
) -> Result<CommandOutcome, SpawnError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(SpawnError::Spawn {
            program: String::new(),
            message: "empty argv".to_string(),
        });
    };

    let started = Instant::now();
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(workdir)
        .env_clear()
        .env("PATH", CONFINED_PATH)
        .env("HOME", workdir)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group so timeouts can address every descendant.
        command.process_group(0);
    }
    let mut child = command
        .spawn()
        .map_err(|err| SpawnError::Spawn {
            program: program.clone(),
            message: err.to_string(),
        })?;

    let stdout = child.stdout.take().ok_or_else(|| SpawnError::Io("no stdout pipe".to_string()))?;
    let stderr = child.stderr.take().ok_or_else(|| SpawnError::Io("no stderr pipe".to_string()))?;
    let stdout_handle = capture_stream(stdout, capture_cap);
    let stderr_handle = capture_stream(stderr, capture_cap);

    let deadline = started + wall;
    let mut timed_out = false;
    let status = loop {
        match child.try_wait().map_err(|err| SpawnError::Io(err.to_string()))? {
            Some(status) => break Some(status),
            None => {
                if Instant::now() >= deadline {
                    timed_out = true;
                    terminate_with_grace(&mut child, grace);
                    break child.try_wait().map_err(|err| SpawnError::Io(err.to_string()))?;
                }
                thread::sleep(WAIT_POLL);
            }
        }
    };

    let exit_code = status.and_then(|status| status.code()).unwrap_or(-1);
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    Ok(CommandOutcome {
        exit_code,
        stdout: render_capture(stdout_handle),
        stderr: render_capture(stderr_handle),
        duration_ms,
        timed_out,
    })
}
