// crates/patch-warden-controller/src/controller.rs
// ============================================================================
// Module: The Controller
// Description: Sequential executor of approved actions with halt-on-failure.
// Purpose: Produce one execution result per approved action, always.
// Dependencies: patch-warden-core, crate::{cancel, fsops, guard, limits, patch_apply, subprocess}
// ============================================================================

//! ## Overview
//! Execution is strictly sequential in declaration order. Before touching
//! anything, the Controller verifies the decision signature against the live
//! kernel key and consumes the decision's input hash exactly once. The first
//! hard failure (timeout, I/O, patch reject, refused write, missing runner)
//! stops the episode's remaining actions; each of them still yields a
//! `not_attempted` result so the ledger records the full sequence.
//!
//! A `run_tests` action whose process exits non-zero is NOT a hard failure:
//! the action ran, the tests failed, and execution continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Instant;

use patch_warden_core::Action;
use patch_warden_core::Decision;
use patch_warden_core::ExecErrorKind;
use patch_warden_core::ExecResult;
use patch_warden_core::KernelKey;
use patch_warden_core::RunnerError;
use patch_warden_core::RunnerLimits;
use patch_warden_core::TestRunner;
use patch_warden_core::core::signature::verify_decision;
use patch_warden_core::runtime::patch;
use patch_warden_core::runtime::pathcheck;

use crate::cancel::CancelToken;
use crate::fsops;
use crate::guard::DecisionGuard;
use crate::limits::ExecLimits;
use crate::patch_apply;
use crate::patch_apply::ApplyError;

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Executor of approved actions within one episode.
///
/// # Invariants
/// - The workspace filesystem is the only mutable resource it touches.
/// - Every approved action produces exactly one [`ExecResult`].
pub struct Controller {
    /// Confinement root (absolute, canonical).
    workspace_root: PathBuf,
    /// Live kernel key for signature verification.
    key: KernelKey,
    /// Execution caps.
    limits: ExecLimits,
    /// Consumed-decision guard for this episode.
    guard: DecisionGuard,
    /// Pluggable test runner backend.
    runner: Box<dyn TestRunner>,
    /// Supervisor cancellation token.
    cancel: CancelToken,
}

impl Controller {
    /// Creates a controller for one episode.
    #[must_use]
    pub fn new(
        workspace_root: PathBuf,
        key: KernelKey,
        limits: ExecLimits,
        runner: Box<dyn TestRunner>,
    ) -> Self {
        Self {
            workspace_root,
            key,
            limits,
            guard: DecisionGuard::new(),
            runner,
            cancel: CancelToken::new(),
        }
    }

    /// Replaces the cancellation token (shared with the supervisor).
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Executes every approved action of a decision, in order.
    ///
    /// Returns one result per approved action. A decision that fails
    /// signature verification or was already consumed yields results flagged
    /// on the first action and `not_attempted` for the rest.
    pub fn execute(&mut self, decision: &Decision) -> Vec<ExecResult> {
        if !decision.allowed || decision.approved_actions.is_empty() {
            return Vec::new();
        }
        let signature_ok = verify_decision(
            &self.key,
            &decision.input_hash,
            decision.allowed,
            decision.reason,
            &decision.approved_actions,
            &decision.signature,
        );
        if !signature_ok {
            return self.refuse_all(decision, ExecErrorKind::SignatureInvalid);
        }
        if !self.guard.consume(&decision.input_hash.value) {
            return self.refuse_all(decision, ExecErrorKind::DecisionReused);
        }

        let mut results: Vec<ExecResult> = Vec::with_capacity(decision.approved_actions.len());
        let mut halted = false;
        for (index, action) in decision.approved_actions.iter().enumerate() {
            let action_index = u64::try_from(index).unwrap_or(u64::MAX);
            if halted || self.cancel.is_cancelled() {
                results.push(ExecResult::not_attempted(action_index, action.kind()));
                continue;
            }
            let result = self.execute_action(action_index, action);
            if matches!(
                result.error_kind,
                Some(
                    ExecErrorKind::Timeout
                        | ExecErrorKind::IoError
                        | ExecErrorKind::PatchFailed
                        | ExecErrorKind::WriteRefused
                        | ExecErrorKind::RunnerUnavailable
                )
            ) {
                halted = true;
            }
            results.push(result);
        }
        results
    }

    /// Flags every action of a refused decision.
    fn refuse_all(&self, decision: &Decision, kind: ExecErrorKind) -> Vec<ExecResult> {
        decision
            .approved_actions
            .iter()
            .enumerate()
            .map(|(index, action)| {
                let action_index = u64::try_from(index).unwrap_or(u64::MAX);
                if index == 0 {
                    ExecResult {
                        action_index,
                        kind: action.kind(),
                        ok: false,
                        stdout: String::new(),
                        stderr: String::new(),
                        bytes_read: 0,
                        bytes_written: 0,
                        duration_ms: 0,
                        error_kind: Some(kind),
                    }
                } else {
                    ExecResult::not_attempted(action_index, action.kind())
                }
            })
            .collect()
    }

    // ========================================================================
    // SECTION: Per-Action Dispatch
    // ========================================================================

    /// Executes one action and measures it.
    fn execute_action(&self, action_index: u64, action: &Action) -> ExecResult {
        let started = Instant::now();
        let mut result = match action {
            Action::ReadFile {
                path,
            } => self.do_read(action_index, path),
            Action::WriteFile {
                path,
                content,
            } => self.do_write(action_index, path, content),
            Action::ApplyPatch {
                unified_diff,
            } => self.do_patch(action_index, unified_diff),
            Action::RunTests {
                argv,
            } => self.do_run_tests(action_index, argv),
            Action::GitDiff {
                paths,
                context,
            } => self.do_git_diff(action_index, paths.as_deref(), *context),
            Action::Grep {
                pattern,
                paths,
            } => self.do_grep(action_index, pattern, paths.as_deref()),
        };
        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        result
    }

    /// Builds a success-shaped result skeleton.
    fn blank(action_index: u64, action_kind: patch_warden_core::ActionKind) -> ExecResult {
        ExecResult {
            action_index,
            kind: action_kind,
            ok: true,
            stdout: String::new(),
            stderr: String::new(),
            bytes_read: 0,
            bytes_written: 0,
            duration_ms: 0,
            error_kind: None,
        }
    }

    /// Marks a result failed with the given kind and message.
    fn fail(mut result: ExecResult, kind: ExecErrorKind, message: &str) -> ExecResult {
        result.ok = false;
        result.error_kind = Some(kind);
        result.stderr = message.to_string();
        result
    }

    /// Executes `read_file`.
    fn do_read(&self, action_index: u64, path: &str) -> ExecResult {
        let result = Self::blank(action_index, patch_warden_core::ActionKind::ReadFile);
        let resolved = match pathcheck::confine(&self.workspace_root, path) {
            Ok(resolved) => resolved,
            Err(err) => return Self::fail(result, ExecErrorKind::IoError, &err.to_string()),
        };
        match fsops::read_capped(&resolved) {
            Ok((text, bytes_read)) => {
                let mut result = result;
                result.stdout = text;
                result.bytes_read = bytes_read;
                result
            }
            Err(err) => Self::fail(result, ExecErrorKind::IoError, &err.to_string()),
        }
    }

    /// Executes `write_file` with the defense-in-depth size re-check.
    fn do_write(&self, action_index: u64, path: &str, content: &str) -> ExecResult {
        let result = Self::blank(action_index, patch_warden_core::ActionKind::WriteFile);
        if content.len() > patch_warden_core::MAX_FILE_WRITE_BYTES {
            return Self::fail(result, ExecErrorKind::WriteRefused, "content exceeds per-file cap");
        }
        let resolved = match pathcheck::confine(&self.workspace_root, path) {
            Ok(resolved) => resolved,
            Err(err) => return Self::fail(result, ExecErrorKind::WriteRefused, &err.to_string()),
        };
        match fsops::write_atomic(&resolved, content.as_bytes()) {
            Ok(bytes_written) => {
                let mut result = result;
                result.bytes_written = bytes_written;
                result
            }
            Err(err) => Self::fail(result, ExecErrorKind::IoError, &err.to_string()),
        }
    }

    /// Executes `apply_patch` through the staged atomic applier, re-checking
    /// the per-file byte cap at execution time.
    fn do_patch(&self, action_index: u64, unified_diff: &str) -> ExecResult {
        let result = Self::blank(action_index, patch_warden_core::ActionKind::ApplyPatch);
        let parsed =
            match patch::parse_patch(unified_diff, patch_warden_core::MAX_FILE_WRITE_BYTES) {
                Ok(parsed) => parsed,
                Err(patch::PatchError::BudgetExceeded { .. }) => {
                    return Self::fail(
                        result,
                        ExecErrorKind::WriteRefused,
                        "patch exceeds per-file cap",
                    );
                }
                Err(err) => {
                    return Self::fail(result, ExecErrorKind::PatchFailed, &err.to_string());
                }
            };
        match patch_apply::apply_patch(&self.workspace_root, &parsed) {
            Ok(stats) => {
                let mut result = result;
                result.stdout = format!("applied {} file(s)", stats.files_changed);
                result.bytes_read = stats.bytes_read;
                result.bytes_written = stats.bytes_written;
                result
            }
            Err(ApplyError::PathRefused(message)) => {
                Self::fail(result, ExecErrorKind::WriteRefused, &message)
            }
            Err(ApplyError::Io(message)) => Self::fail(result, ExecErrorKind::IoError, &message),
            Err(err) => Self::fail(result, ExecErrorKind::PatchFailed, &err.to_string()),
        }
    }

    /// Executes `run_tests` through the runner interface.
    fn do_run_tests(&self, action_index: u64, argv: &[String]) -> ExecResult {
        let result = Self::blank(action_index, patch_warden_core::ActionKind::RunTests);
        let limits = RunnerLimits {
            wall: self.limits.test_wall(),
            ..RunnerLimits::default_test_limits()
        };
        match self.runner.run(&self.workspace_root, argv, &limits) {
            Ok(outcome) => {
                let mut result = result;
                // Non-zero exit means the tests failed, not that the action
                // broke; execution continues.
                result.ok = outcome.exit_code == 0;
                result.stdout = outcome.stdout;
                result.stderr = outcome.stderr;
                result
            }
            Err(RunnerError::Timeout(_)) => {
                Self::fail(result, ExecErrorKind::Timeout, "test run timed out")
            }
            Err(RunnerError::Unavailable(message)) => {
                Self::fail(result, ExecErrorKind::RunnerUnavailable, &message)
            }
            Err(RunnerError::Io(message)) => Self::fail(result, ExecErrorKind::IoError, &message),
        }
    }

    /// Executes `git_diff` (read-only, working tree).
    fn do_git_diff(
        &self,
        action_index: u64,
        paths: Option<&[String]>,
        context: Option<u32>,
    ) -> ExecResult {
        let result = Self::blank(action_index, patch_warden_core::ActionKind::GitDiff);
        let outcome = fsops::git_diff(
            &self.workspace_root,
            paths,
            context,
            self.limits.action_wall(),
            self.limits.term_grace(),
        );
        match outcome {
            Ok(outcome) if outcome.timed_out => {
                Self::fail(result, ExecErrorKind::Timeout, "git diff timed out")
            }
            Ok(outcome) => {
                let mut result = result;
                result.ok = outcome.exit_code == 0;
                result.stdout = outcome.stdout;
                result.stderr = outcome.stderr;
                if !result.ok {
                    result.error_kind = Some(ExecErrorKind::IoError);
                }
                result
            }
            Err(err) => Self::fail(result, ExecErrorKind::IoError, &err.to_string()),
        }
    }

    /// Executes `grep` (bounded, read-only, in-process).
    fn do_grep(&self, action_index: u64, pattern: &str, paths: Option<&[String]>) -> ExecResult {
        let result = Self::blank(action_index, patch_warden_core::ActionKind::Grep);
        match fsops::grep_literal(&self.workspace_root, pattern, paths) {
            Ok(outcome) => {
                let mut result = result;
                result.stdout = outcome.rendered;
                result.bytes_read = outcome.bytes_read;
                result
            }
            Err(err) => Self::fail(result, ExecErrorKind::IoError, &err.to_string()),
        }
    }
}
