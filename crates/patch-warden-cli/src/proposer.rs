// crates/patch-warden-cli/src/proposer.rs
// ============================================================================
// Module: Fixture Proposer
// Description: File-fed proposer for reproducible, model-free runs.
// Purpose: Drive episodes from ordered proposal JSON files.
// Dependencies: patch-warden-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The fixture proposer reads `*.json` proposal documents from a directory
//! in sorted filename order, one per `propose` call. The selected bandit arm
//! is echoed into the proposal's `meta` under `arm`, which is how arm
//! provenance reaches the ledger without the Gate ever consulting it.
//! An LLM-backed proposer would implement the same [`Proposer`] trait out of
//! process; the kernel never reads `LLM_*` environment variables itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use patch_warden_core::ArmId;
use patch_warden_core::ProposeError;
use patch_warden_core::Proposal;
use patch_warden_core::Proposer;
use patch_warden_core::StateSnapshot;

// ============================================================================
// SECTION: Proposer
// ============================================================================

/// Proposer that replays proposal files in sorted order.
///
/// # Invariants
/// - Files are consumed exactly once each, in filename order.
#[derive(Debug)]
pub struct FixtureProposer {
    /// Remaining proposal files, next-first.
    queue: Vec<PathBuf>,
}

impl FixtureProposer {
    /// Builds a proposer over every `*.json` file in a directory.
    ///
    /// A missing directory yields an empty queue: the first `propose` call
    /// reports exhaustion rather than an error.
    #[must_use]
    pub fn from_dir(dir: &Path) -> Self {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|dir_entry| dir_entry.path())
                    .filter(|path| {
                        path.extension().is_some_and(|extension| extension == "json")
                    })
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        files.reverse();
        Self {
            queue: files,
        }
    }

    /// Returns the number of queued proposals.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl Proposer for FixtureProposer {
    fn propose(
        &mut self,
        _snapshot: &StateSnapshot,
        arm: &ArmId,
    ) -> Result<Proposal, ProposeError> {
        let Some(path) = self.queue.pop() else {
            return Err(ProposeError::Exhausted);
        };
        let raw = std::fs::read_to_string(&path)
            .map_err(|err| ProposeError::Failed(format!("{}: {err}", path.display())))?;
        let mut proposal: Proposal = serde_json::from_str(&raw)
            .map_err(|err| ProposeError::Failed(format!("{}: {err}", path.display())))?;
        proposal.meta.insert("arm".to_string(), arm.as_str().to_string());
        Ok(proposal)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions are permitted."
    )]

    use std::fs;

    use patch_warden_core::ArmId;
    use patch_warden_core::ProposeError;
    use patch_warden_core::Proposer;
    use patch_warden_core::StateSnapshot;
    use tempfile::TempDir;

    use super::FixtureProposer;

    fn snapshot(dir: &TempDir) -> StateSnapshot {
        StateSnapshot::new(dir.path().to_path_buf())
    }

    #[test]
    fn proposals_are_consumed_in_sorted_order() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("02-second.json"),
            r#"{"actions":[{"kind":"grep","pattern":"beta","paths":null}],"meta":{}}"#,
        )
        .expect("write");
        fs::write(
            dir.path().join("01-first.json"),
            r#"{"actions":[{"kind":"grep","pattern":"alpha","paths":null}],"meta":{}}"#,
        )
        .expect("write");

        let mut proposer = FixtureProposer::from_dir(dir.path());
        assert_eq!(proposer.remaining(), 2);
        let snapshot = snapshot(&dir);
        let arm = ArmId::new("a");
        let first = proposer.propose(&snapshot, &arm).expect("first");
        let second = proposer.propose(&snapshot, &arm).expect("second");
        let rendered = format!("{first:?}{second:?}");
        let alpha_at = rendered.find("alpha").expect("alpha present");
        let beta_at = rendered.find("beta").expect("beta present");
        assert!(alpha_at < beta_at, "01-first must be proposed before 02-second");
    }

    #[test]
    fn arm_is_echoed_into_meta() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("p.json"),
            r#"{"actions":[{"kind":"read_file","path":"a.txt"}],"meta":{}}"#,
        )
        .expect("write");
        let mut proposer = FixtureProposer::from_dir(dir.path());
        let proposal =
            proposer.propose(&snapshot(&dir), &ArmId::new("strategy-7")).expect("proposal");
        assert_eq!(proposal.meta.get("arm").map(String::as_str), Some("strategy-7"));
    }

    #[test]
    fn exhaustion_and_missing_directory_report_exhausted() {
        let dir = TempDir::new().expect("tempdir");
        let mut empty = FixtureProposer::from_dir(&dir.path().join("missing"));
        let result = empty.propose(&snapshot(&dir), &ArmId::new("a"));
        assert!(matches!(result, Err(ProposeError::Exhausted)));
    }
}
