// crates/patch-warden-controller/tests/patch_apply_exec.rs
// ============================================================================
// Module: Patch Application Tests
// Description: Atomic hunk application, rejection, and rollback behavior.
// Purpose: Guarantee a patch commits fully or not at all.
// ============================================================================

//! ## Overview
//! Applies real diffs against a temporary workspace: modify, create (in new
//! directories), delete, rename, multi-file commits, and context mismatch
//! rejection that leaves the workspace byte-identical.

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
use std::path::PathBuf;

use patch_warden_controller::patch_apply::ApplyError;
use patch_warden_controller::patch_apply::apply_patch;
use patch_warden_core::runtime::patch::parse_patch;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir_all(dir.path().join("src")).expect("mkdir");
    fs::write(dir.path().join("src/a.py"), "import os\nx=1\nprint(x)\n").expect("seed");
    let root = dir.path().canonicalize().expect("canonical root");
    (dir, root)
}

fn apply(root: &PathBuf, diff: &str) -> Result<(), ApplyError> {
    let parsed = parse_patch(diff, patch_warden_core::MAX_FILE_WRITE_BYTES).expect("diff must parse");
    apply_patch(root, &parsed).map(|_| ())
}

// ============================================================================
// SECTION: Commits
// ============================================================================

#[test]
fn modify_patch_rewrites_the_target() {
    let (_dir, root) = workspace();
    let diff = "\
diff --git a/src/a.py b/src/a.py
--- a/src/a.py
+++ b/src/a.py
@@ -1,3 +1,3 @@
 import os
-x=1
+x=2
 print(x)
";
    apply(&root, diff).expect("apply");
    assert_eq!(
        fs::read_to_string(root.join("src/a.py")).expect("read"),
        "import os\nx=2\nprint(x)\n"
    );
}

#[test]
fn create_patch_builds_new_directories() {
    let (_dir, root) = workspace();
    let diff = "\
diff --git a/pkg/util/fresh.py b/pkg/util/fresh.py
new file mode 100644
--- /dev/null
+++ b/pkg/util/fresh.py
@@ -0,0 +1,2 @@
+def fresh():
+    return 1
";
    apply(&root, diff).expect("apply");
    assert_eq!(
        fs::read_to_string(root.join("pkg/util/fresh.py")).expect("read"),
        "def fresh():\n    return 1\n"
    );
}

#[test]
fn delete_patch_removes_the_file() {
    let (_dir, root) = workspace();
    fs::write(root.join("src/old.py"), "stale = True\n").expect("seed");
    let diff = "\
diff --git a/src/old.py b/src/old.py
deleted file mode 100644
--- a/src/old.py
+++ /dev/null
@@ -1,1 +0,0 @@
-stale = True
";
    apply(&root, diff).expect("apply");
    assert!(!root.join("src/old.py").exists());
}

#[test]
fn rename_patch_moves_content() {
    let (_dir, root) = workspace();
    fs::write(root.join("src/before.py"), "keep = 1\n").expect("seed");
    let diff = "\
diff --git a/src/before.py b/src/after.py
similarity index 100%
rename from src/before.py
rename to src/after.py
";
    apply(&root, diff).expect("apply");
    assert!(!root.join("src/before.py").exists());
    assert_eq!(fs::read_to_string(root.join("src/after.py")).expect("read"), "keep = 1\n");
}

#[test]
fn insertion_hunk_appends_after_anchor() {
    let (_dir, root) = workspace();
    let diff = "\
diff --git a/src/a.py b/src/a.py
--- a/src/a.py
+++ b/src/a.py
@@ -1,0 +2,1 @@
+import sys
";
    apply(&root, diff).expect("apply");
    assert_eq!(
        fs::read_to_string(root.join("src/a.py")).expect("read"),
        "import os\nimport sys\nx=1\nprint(x)\n"
    );
}

// ============================================================================
// SECTION: Rejections
// ============================================================================

#[test]
fn context_mismatch_rejects_and_leaves_workspace_untouched() {
    let (_dir, root) = workspace();
    let before = fs::read_to_string(root.join("src/a.py")).expect("read");
    let diff = "\
diff --git a/src/a.py b/src/a.py
--- a/src/a.py
+++ b/src/a.py
@@ -1,3 +1,3 @@
 import os
-x=999
+x=2
 print(x)
";
    let result = apply(&root, diff);
    assert!(matches!(result, Err(ApplyError::ContextMismatch { .. })));
    assert_eq!(fs::read_to_string(root.join("src/a.py")).expect("read"), before);
}

#[test]
fn multi_file_patch_rejects_wholesale_on_one_bad_file() {
    let (_dir, root) = workspace();
    fs::write(root.join("src/b.py"), "y=1\n").expect("seed");
    let before_a = fs::read_to_string(root.join("src/a.py")).expect("read");
    let diff = "\
diff --git a/src/a.py b/src/a.py
--- a/src/a.py
+++ b/src/a.py
@@ -1,3 +1,3 @@
 import os
-x=1
+x=2
 print(x)
diff --git a/src/b.py b/src/b.py
--- a/src/b.py
+++ b/src/b.py
@@ -1,1 +1,1 @@
-y=wrong
+y=2
";
    let result = apply(&root, diff);
    assert!(matches!(result, Err(ApplyError::ContextMismatch { .. })));
    assert_eq!(
        fs::read_to_string(root.join("src/a.py")).expect("read"),
        before_a,
        "First file must not be committed when the second rejects"
    );
    assert_eq!(fs::read_to_string(root.join("src/b.py")).expect("read"), "y=1\n");
}

#[test]
fn create_over_existing_file_is_rejected() {
    let (_dir, root) = workspace();
    let diff = "\
diff --git a/src/a.py b/src/a.py
new file mode 100644
--- /dev/null
+++ b/src/a.py
@@ -0,0 +1,1 @@
+x=0
";
    let result = apply(&root, diff);
    assert!(matches!(result, Err(ApplyError::TargetState { .. })));
}
