// crates/patch-warden-controller/tests/controller_exec.rs
// ============================================================================
// Module: Controller Execution Tests
// Description: Signature gating, reuse guard, halt-on-failure, round trips.
// Purpose: Validate the executor contract without a real test toolchain.
// ============================================================================

//! ## Overview
//! Uses a scripted in-test runner so no Python toolchain is needed: the
//! tests pin the write/read round-trip law, signature and reuse refusals,
//! `not_attempted` propagation, cancellation, and the defense-in-depth write
//! cap.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use patch_warden_controller::CancelToken;
use patch_warden_controller::Controller;
use patch_warden_controller::ExecLimits;
use patch_warden_core::Action;
use patch_warden_core::Decision;
use patch_warden_core::DecisionReason;
use patch_warden_core::ExecErrorKind;
use patch_warden_core::Gate;
use patch_warden_core::KernelKey;
use patch_warden_core::Proposal;
use patch_warden_core::RunnerError;
use patch_warden_core::RunnerLimits;
use patch_warden_core::RunnerOutcome;
use patch_warden_core::StateSnapshot;
use patch_warden_core::TestRunner;
use patch_warden_core::core::signature::sign_decision;
use patch_warden_core::hashing::HashAlgorithm;
use patch_warden_core::hashing::hash_bytes;
use tempfile::TempDir;

// ============================================================================
// SECTION: Scripted Runner
// ============================================================================

/// Runner that returns a fixed exit code without spawning anything.
struct ScriptedRunner {
    exit_code: i32,
}

impl TestRunner for ScriptedRunner {
    fn run(
        &self,
        _workspace: &Path,
        _argv: &[String],
        _limits: &RunnerLimits,
    ) -> Result<RunnerOutcome, RunnerError> {
        Ok(RunnerOutcome {
            exit_code: self.exit_code,
            stdout: "1 passed\n".to_string(),
            stderr: String::new(),
            duration_ms: 3,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn kernel_key() -> KernelKey {
    KernelKey::from_bytes([5u8; 32])
}

fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir_all(dir.path().join("src")).expect("mkdir");
    fs::write(dir.path().join("src/a.py"), "x=1\n").expect("seed");
    let root = dir.path().canonicalize().expect("canonical root");
    (dir, root)
}

fn approved(root: &Path, actions: Vec<Action>) -> Decision {
    let snapshot = StateSnapshot::new(root.to_path_buf());
    let decision = Gate::new(kernel_key()).evaluate(&snapshot, &Proposal::new(actions));
    assert!(decision.allowed, "fixture proposal must be approved: {:?}", decision.reason);
    decision
}

fn controller(root: &Path, exit_code: i32) -> Controller {
    Controller::new(
        root.to_path_buf(),
        kernel_key(),
        ExecLimits::default(),
        Box::new(ScriptedRunner {
            exit_code,
        }),
    )
}

// ============================================================================
// SECTION: Round Trips
// ============================================================================

#[test]
fn write_then_read_returns_exact_bytes() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 0);
    let content = "x=2\nprint(x)\n";
    let decision = approved(&root, vec![
        Action::WriteFile {
            path: "src/a.py".to_string(),
            content: content.to_string(),
        },
        Action::ReadFile {
            path: "src/a.py".to_string(),
        },
    ]);

    let results = controller.execute(&decision);
    assert_eq!(results.len(), 2);
    assert!(results[0].ok);
    assert_eq!(results[0].bytes_written, u64::try_from(content.len()).expect("len"));
    assert!(results[1].ok);
    assert_eq!(results[1].stdout, content, "Read must return the exact bytes written");
    assert_eq!(fs::read_to_string(root.join("src/a.py")).expect("read back"), content);
}

#[test]
fn write_lands_in_new_subdirectory() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 0);
    let decision = approved(&root, vec![Action::WriteFile {
        path: "pkg/util/helper.py".to_string(),
        content: "pass\n".to_string(),
    }]);
    let results = controller.execute(&decision);
    assert!(results[0].ok, "{:?}", results[0]);
    assert!(root.join("pkg/util/helper.py").is_file());
}

// ============================================================================
// SECTION: Signature and Reuse Refusals
// ============================================================================

#[test]
fn tampered_signature_refuses_execution() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 0);
    let mut decision = approved(&root, vec![
        Action::WriteFile {
            path: "src/a.py".to_string(),
            content: "x=9\n".to_string(),
        },
        Action::ReadFile {
            path: "src/a.py".to_string(),
        },
    ]);
    decision.signature = sign_decision(
        &KernelKey::from_bytes([6u8; 32]),
        &decision.input_hash,
        decision.allowed,
        decision.reason,
        &decision.approved_actions,
    );

    let results = controller.execute(&decision);
    assert_eq!(results[0].error_kind, Some(ExecErrorKind::SignatureInvalid));
    assert_eq!(results[1].error_kind, Some(ExecErrorKind::NotAttempted));
    assert_eq!(
        fs::read_to_string(root.join("src/a.py")).expect("read"),
        "x=1\n",
        "Refused decision must not touch the workspace"
    );
}

#[test]
fn decision_is_consumed_at_most_once() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 0);
    let decision = approved(&root, vec![Action::ReadFile {
        path: "src/a.py".to_string(),
    }]);

    let first = controller.execute(&decision);
    assert!(first[0].ok);
    let second = controller.execute(&decision);
    assert_eq!(second[0].error_kind, Some(ExecErrorKind::DecisionReused));
}

#[test]
fn forged_oversized_write_is_refused_at_execution() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 0);
    // Bypass the gate deliberately: a validly signed decision with an
    // oversized payload must still be refused by the execution-time cap.
    let key = kernel_key();
    let actions = vec![Action::WriteFile {
        path: "big.txt".to_string(),
        content: "x".repeat(patch_warden_core::MAX_FILE_WRITE_BYTES + 1),
    }];
    let input_hash = hash_bytes(HashAlgorithm::Sha256, b"forged-input");
    let signature = sign_decision(&key, &input_hash, true, DecisionReason::Ok, &actions);
    let decision = Decision {
        allowed: true,
        reason: DecisionReason::Ok,
        approved_actions: actions,
        input_hash,
        signature,
    };

    let results = controller.execute(&decision);
    assert_eq!(results[0].error_kind, Some(ExecErrorKind::WriteRefused));
    assert!(!root.join("big.txt").exists());
}

#[test]
fn forged_oversized_patch_is_refused_at_execution() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 0);
    // Same bypass as above, but through the patch path: one file record
    // adding more than the per-file cap must be refused before staging.
    let key = kernel_key();
    let payload = "a".repeat(patch_warden_core::MAX_FILE_WRITE_BYTES);
    let diff = format!(
        "diff --git a/big.txt b/big.txt\nnew file mode 100644\n--- /dev/null\n+++ \
         b/big.txt\n@@ -0,0 +1,1 @@\n+{payload}\n"
    );
    let actions = vec![Action::ApplyPatch {
        unified_diff: diff,
    }];
    let input_hash = hash_bytes(HashAlgorithm::Sha256, b"forged-patch-input");
    let signature = sign_decision(&key, &input_hash, true, DecisionReason::Ok, &actions);
    let decision = Decision {
        allowed: true,
        reason: DecisionReason::Ok,
        approved_actions: actions,
        input_hash,
        signature,
    };

    let results = controller.execute(&decision);
    assert_eq!(results[0].error_kind, Some(ExecErrorKind::WriteRefused));
    assert!(!root.join("big.txt").exists());
}

// ============================================================================
// SECTION: Halt and Cancellation
// ============================================================================

#[test]
fn io_error_halts_remaining_actions() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 0);
    let decision = approved(&root, vec![
        Action::ReadFile {
            path: "src/missing.py".to_string(),
        },
        Action::WriteFile {
            path: "src/a.py".to_string(),
            content: "x=3\n".to_string(),
        },
    ]);

    let results = controller.execute(&decision);
    assert_eq!(results[0].error_kind, Some(ExecErrorKind::IoError));
    assert_eq!(results[1].error_kind, Some(ExecErrorKind::NotAttempted));
    assert_eq!(
        fs::read_to_string(root.join("src/a.py")).expect("read"),
        "x=1\n",
        "Halted actions must not run"
    );
}

#[test]
fn failing_tests_do_not_halt_execution() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 1);
    let decision = approved(&root, vec![
        Action::RunTests {
            argv: vec!["pytest".to_string(), "-q".to_string()],
        },
        Action::ReadFile {
            path: "src/a.py".to_string(),
        },
    ]);

    let results = controller.execute(&decision);
    assert!(!results[0].ok, "Non-zero exit reports failure");
    assert_eq!(results[0].error_kind, None, "Test failure is not an execution fault");
    assert!(results[1].ok, "Execution continues after failed tests");
}

#[test]
fn cancellation_marks_actions_not_attempted() {
    let (_dir, root) = workspace();
    let cancel = CancelToken::new();
    let mut controller = controller(&root, 0).with_cancel(cancel.clone());
    cancel.cancel();
    let decision = approved(&root, vec![Action::ReadFile {
        path: "src/a.py".to_string(),
    }]);

    let results = controller.execute(&decision);
    assert_eq!(results[0].error_kind, Some(ExecErrorKind::NotAttempted));
}

#[test]
fn denied_decision_executes_nothing() {
    let (_dir, root) = workspace();
    let mut controller = controller(&root, 0);
    let snapshot = StateSnapshot::new(root.clone());
    let decision = Gate::new(kernel_key()).evaluate(
        &snapshot,
        &Proposal::new(vec![Action::WriteFile {
            path: "../outside.txt".to_string(),
            content: "hi".to_string(),
        }]),
    );
    assert!(!decision.allowed);
    assert!(controller.execute(&decision).is_empty());
}
