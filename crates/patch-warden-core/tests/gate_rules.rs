// crates/patch-warden-core/tests/gate_rules.rs
// ============================================================================
// Module: Gate Ruleset Tests
// Description: Structural, confinement, budget, and argv rules of the Gate.
// Purpose: Pin every boundary the safety reviewer relies on.
// ============================================================================

//! ## Overview
//! Exercises the Gate against a real temporary workspace: structural
//! denials, path confinement (including symlink escapes), write budgets at
//! their exact boundaries, and the test-command allowlist.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::fs;

use patch_warden_core::Action;
use patch_warden_core::DecisionReason;
use patch_warden_core::Gate;
use patch_warden_core::KernelKey;
use patch_warden_core::MAX_FILE_WRITE_BYTES;
use patch_warden_core::MAX_PROPOSAL_ACTIONS;
use patch_warden_core::Proposal;
use patch_warden_core::StateSnapshot;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn test_key() -> KernelKey {
    KernelKey::from_bytes([7u8; 32])
}

fn workspace() -> (TempDir, StateSnapshot) {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir_all(dir.path().join("src")).expect("mkdir src");
    fs::write(dir.path().join("src/a.py"), "x=1\n").expect("seed file");
    let snapshot = StateSnapshot::new(dir.path().canonicalize().expect("canonical root"));
    (dir, snapshot)
}

fn write_action(path: &str, content: &str) -> Action {
    Action::WriteFile {
        path: path.to_string(),
        content: content.to_string(),
    }
}

fn run_tests_action(argv: &[&str]) -> Action {
    Action::RunTests {
        argv: argv.iter().map(ToString::to_string).collect(),
    }
}

fn create_patch_action(path: &str, payload_len: usize) -> Action {
    let payload = "a".repeat(payload_len);
    let diff = format!(
        "diff --git a/{path} b/{path}\nnew file mode 100644\n--- /dev/null\n+++ \
         b/{path}\n@@ -0,0 +1,1 @@\n+{payload}\n"
    );
    Action::ApplyPatch {
        unified_diff: diff,
    }
}

fn evaluate(snapshot: &StateSnapshot, actions: Vec<Action>) -> (bool, DecisionReason) {
    let gate = Gate::new(test_key());
    let decision = gate.evaluate(snapshot, &Proposal::new(actions));
    (decision.allowed, decision.reason)
}

// ============================================================================
// SECTION: Structural Rules
// ============================================================================

#[test]
fn empty_proposal_is_denied() {
    let (_dir, snapshot) = workspace();
    let (allowed, reason) = evaluate(&snapshot, Vec::new());
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::EmptyProposal);
}

#[test]
fn action_count_cap_is_exact() {
    let (_dir, snapshot) = workspace();
    let at_cap: Vec<Action> = (0..MAX_PROPOSAL_ACTIONS)
        .map(|i| write_action(&format!("f{i}.txt"), "ok"))
        .collect();
    let (allowed, reason) = evaluate(&snapshot, at_cap);
    assert!(allowed, "64 actions must pass: {reason:?}");

    let over_cap: Vec<Action> = (0..=MAX_PROPOSAL_ACTIONS)
        .map(|i| write_action(&format!("f{i}.txt"), "ok"))
        .collect();
    let (allowed, reason) = evaluate(&snapshot, over_cap);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::TooManyActions);
}

#[test]
fn duplicate_write_targets_are_denied() {
    let (_dir, snapshot) = workspace();
    let actions = vec![write_action("src/a.py", "x=2\n"), write_action("src/a.py", "x=3\n")];
    let (allowed, reason) = evaluate(&snapshot, actions);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::DuplicateWrite);
}

#[test]
fn denied_decision_has_no_approved_actions() {
    let (_dir, snapshot) = workspace();
    let gate = Gate::new(test_key());
    let decision = gate.evaluate(&snapshot, &Proposal::new(vec![write_action("../x", "hi")]));
    assert!(!decision.allowed);
    assert!(decision.approved_actions.is_empty());
}

// ============================================================================
// SECTION: Path Confinement
// ============================================================================

#[test]
fn parent_traversal_is_path_escape() {
    let (_dir, snapshot) = workspace();
    let (allowed, reason) = evaluate(&snapshot, vec![write_action("../outside.txt", "hi")]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::PathEscape);
}

#[test]
fn absolute_path_is_path_escape() {
    let (_dir, snapshot) = workspace();
    let (allowed, reason) = evaluate(&snapshot, vec![write_action("/etc/hosts", "hi")]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::PathEscape);
}

#[test]
fn git_segment_is_blocked() {
    let (_dir, snapshot) = workspace();
    let (allowed, reason) = evaluate(&snapshot, vec![write_action(".git/config", "x")]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::BlockedSegment);
}

#[test]
fn ssh_segment_is_blocked_for_reads_too() {
    let (_dir, snapshot) = workspace();
    let action = Action::ReadFile {
        path: ".ssh/id_ed25519".to_string(),
    };
    let (allowed, reason) = evaluate(&snapshot, vec![action]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::BlockedSegment);
}

#[test]
fn nul_byte_in_payload_is_denied() {
    let (_dir, snapshot) = workspace();
    let (allowed, reason) = evaluate(&snapshot, vec![write_action("ok.txt", "a\0b")]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::NulInPayload);
}

#[cfg(unix)]
#[test]
fn symlink_escape_is_path_escape() {
    let (dir, snapshot) = workspace();
    std::os::unix::fs::symlink("/etc", dir.path().join("out")).expect("symlink");
    let (allowed, reason) = evaluate(&snapshot, vec![write_action("out/x", "hi")]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::PathEscape);
}

#[cfg(unix)]
#[test]
fn symlink_inside_workspace_is_allowed() {
    let (dir, snapshot) = workspace();
    std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("alias")).expect("symlink");
    let (allowed, reason) = evaluate(&snapshot, vec![write_action("alias/b.py", "y=1\n")]);
    assert!(allowed, "internal symlink must pass: {reason:?}");
}

// ============================================================================
// SECTION: Budgets
// ============================================================================

#[test]
fn per_file_write_cap_is_exact() {
    let (_dir, snapshot) = workspace();
    let at_cap = "x".repeat(MAX_FILE_WRITE_BYTES);
    let (allowed, reason) = evaluate(&snapshot, vec![write_action("big.txt", &at_cap)]);
    assert!(allowed, "512 KiB must pass: {reason:?}");

    let over_cap = "x".repeat(MAX_FILE_WRITE_BYTES + 1);
    let (allowed, reason) = evaluate(&snapshot, vec![write_action("big.txt", &over_cap)]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::BudgetExceeded);
}

#[test]
fn per_file_patch_cap_is_exact() {
    let (_dir, snapshot) = workspace();
    // One added line of N payload bytes contributes N + 1 bytes, so the
    // whole diff stays far under the 2 MiB aggregate either way.
    let at_cap = create_patch_action("big.txt", MAX_FILE_WRITE_BYTES - 1);
    let (allowed, reason) = evaluate(&snapshot, vec![at_cap]);
    assert!(allowed, "512 KiB added to one file must pass: {reason:?}");

    let over_cap = create_patch_action("big.txt", MAX_FILE_WRITE_BYTES);
    let (allowed, reason) = evaluate(&snapshot, vec![over_cap]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::BudgetExceeded);
}

#[test]
fn total_write_budget_is_enforced_across_actions() {
    let (_dir, snapshot) = workspace();
    let chunk = "x".repeat(400 * 1024);
    let under: Vec<Action> =
        (0..5).map(|i| write_action(&format!("w{i}.txt"), &chunk)).collect();
    let (allowed, reason) = evaluate(&snapshot, under);
    assert!(allowed, "2000 KiB total must pass: {reason:?}");

    let mut over: Vec<Action> =
        (0..5).map(|i| write_action(&format!("w{i}.txt"), &chunk)).collect();
    over.push(write_action("w5.txt", &"x".repeat(200 * 1024)));
    let (allowed, reason) = evaluate(&snapshot, over);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::BudgetExceeded);
}

// ============================================================================
// SECTION: Test Command Allowlist
// ============================================================================

#[test]
fn plain_pytest_is_allowed() {
    let (_dir, snapshot) = workspace();
    let (allowed, _) = evaluate(&snapshot, vec![run_tests_action(&["pytest", "-q"])]);
    assert!(allowed);
}

#[test]
fn python_module_pytest_is_allowed() {
    let (_dir, snapshot) = workspace();
    let argv = run_tests_action(&["python", "-m", "pytest", "-q", "tests/t.py::test_ok"]);
    let (allowed, _) = evaluate(&snapshot, vec![argv]);
    assert!(allowed);
}

#[test]
fn node_id_token_is_allowed() {
    let (_dir, snapshot) = workspace();
    let argv = run_tests_action(&["pytest", "-q", "tests/t.py::test_ok"]);
    let (allowed, _) = evaluate(&snapshot, vec![argv]);
    assert!(allowed);
}

#[test]
fn extra_flags_are_bad_test_argv() {
    let (_dir, snapshot) = workspace();
    for forbidden in ["-s", "-x", "--cov", "-k", "-p", "-o"] {
        let (allowed, reason) = evaluate(&snapshot, vec![run_tests_action(&["pytest", "-q", forbidden])]);
        assert!(!allowed, "{forbidden} must be denied");
        assert_eq!(reason, DecisionReason::BadTestArgv);
    }
}

#[test]
fn traversal_node_id_is_bad_test_argv() {
    let (_dir, snapshot) = workspace();
    let argv = run_tests_action(&["pytest", "-q", "../etc/passwd"]);
    let (allowed, reason) = evaluate(&snapshot, vec![argv]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::BadTestArgv);
}

#[test]
fn bare_python_is_bad_test_argv() {
    let (_dir, snapshot) = workspace();
    let (allowed, reason) = evaluate(&snapshot, vec![run_tests_action(&["python", "evil.py"])]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::BadTestArgv);
}

#[test]
fn overlong_node_id_is_bad_test_argv() {
    let (_dir, snapshot) = workspace();
    let long_id = "t".repeat(257);
    let argv = Action::RunTests {
        argv: vec!["pytest".to_string(), "-q".to_string(), long_id],
    };
    let (allowed, reason) = evaluate(&snapshot, vec![argv]);
    assert!(!allowed);
    assert_eq!(reason, DecisionReason::BadTestArgv);
}

// ============================================================================
// SECTION: Ordering and Metadata
// ============================================================================

#[test]
fn tests_after_mutation_is_allowed() {
    let (_dir, snapshot) = workspace();
    let actions = vec![write_action("src/a.py", "x=2\n"), run_tests_action(&["pytest", "-q"])];
    let (allowed, reason) = evaluate(&snapshot, actions);
    assert!(allowed, "S1 shape must pass: {reason:?}");
}

#[test]
fn mutation_after_tests_is_allowed() {
    let (_dir, snapshot) = workspace();
    let actions = vec![run_tests_action(&["pytest", "-q"]), write_action("src/a.py", "x=2\n")];
    let (allowed, _) = evaluate(&snapshot, actions);
    assert!(allowed, "No global interleave rule applies");
}

#[test]
fn meta_changes_hash_but_not_verdict() {
    let (_dir, snapshot) = workspace();
    let gate = Gate::new(test_key());
    let actions = vec![write_action("src/a.py", "x=2\n")];

    let plain = gate.evaluate(&snapshot, &Proposal::new(actions.clone()));
    let mut meta = BTreeMap::new();
    meta.insert("arm".to_string(), "strategy-a".to_string());
    let tagged = gate.evaluate(&snapshot, &Proposal::with_meta(actions, meta));

    assert_eq!(plain.allowed, tagged.allowed);
    assert_eq!(plain.reason, tagged.reason);
    assert_ne!(plain.input_hash, tagged.input_hash, "meta must be hashed");
}
