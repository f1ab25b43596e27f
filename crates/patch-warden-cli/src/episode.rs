// crates/patch-warden-cli/src/episode.rs
// ============================================================================
// Module: Episode Runner
// Description: Wires bandit, proposer, Gate, Controller, and ledger per episode.
// Purpose: Drive the fixed event sequence the replay verifier expects.
// Dependencies: patch-warden-{bandit, controller, core, ledger}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One episode emits the fixed ledger sequence `episode_begin →
//! proposal_seen → gate_decision → exec_result(0..k) → episode_end`. A
//! denied proposal skips straight from the decision to the end marker. The
//! bandit seed is the episode index, so a rerun over the same fixtures is
//! reproducible end to end. A ledger append failure aborts the run: the
//! episode stays unfinished on disk by construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use patch_warden_bandit::SqliteBanditConfig;
use patch_warden_bandit::SqliteBanditError;
use patch_warden_bandit::SqliteBanditStore;
use patch_warden_controller::CancelToken;
use patch_warden_controller::Controller;
use patch_warden_controller::ExecLimits;
use patch_warden_controller::SubprocessRunner;
use patch_warden_core::ArmId;
use patch_warden_core::EpisodeId;
use patch_warden_core::Gate;
use patch_warden_core::KernelKey;
use patch_warden_core::ProposeError;
use patch_warden_core::Proposer;
use patch_warden_core::StateSnapshot;
use patch_warden_ledger::EpisodeBeginPayload;
use patch_warden_ledger::EpisodeEndPayload;
use patch_warden_ledger::EpisodeStatus;
use patch_warden_ledger::EventType;
use patch_warden_ledger::ExecResultPayload;
use patch_warden_ledger::GateDecisionPayload;
use patch_warden_ledger::LedgerError;
use patch_warden_ledger::LedgerWriter;
use patch_warden_ledger::ProposalSeenPayload;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Episode runner failures.
#[derive(Debug, Error)]
pub enum EpisodeError {
    /// Workspace path is unusable.
    #[error("workspace error: {0}")]
    Workspace(String),
    /// Ledger open or append failed; the episode aborts unfinished.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    /// Bandit store failure.
    #[error("bandit error: {0}")]
    Bandit(#[from] SqliteBanditError),
    /// Proposer failure other than exhaustion.
    #[error("proposer error: {0}")]
    Proposer(String),
    /// Payload serialization failure (indicates a schema bug).
    #[error("payload encoding error: {0}")]
    Encoding(String),
}

// ============================================================================
// SECTION: Options and Summaries
// ============================================================================

/// Inputs for a run of one or more episodes.
#[derive(Debug)]
pub struct RunOptions {
    /// Workspace root (will be canonicalized).
    pub workspace: PathBuf,
    /// Number of episodes to attempt.
    pub episodes: u32,
    /// Kernel signing key.
    pub key: KernelKey,
    /// Execution caps.
    pub limits: ExecLimits,
    /// Ledger file path.
    pub ledger_path: PathBuf,
    /// Checkpoint file path.
    pub checkpoint_path: PathBuf,
    /// Bandit database path.
    pub bandit_path: PathBuf,
    /// Enabled strategy arms.
    pub arms: Vec<String>,
    /// Supervisor cancellation token.
    pub cancel: CancelToken,
}

/// Outcome of one episode.
#[derive(Debug, Clone)]
pub struct EpisodeSummary {
    /// Episode identifier.
    pub episode_id: EpisodeId,
    /// Selected arm, when the bandit had any enabled.
    pub arm: Option<ArmId>,
    /// Whether the gate approved the proposal.
    pub allowed: bool,
    /// Stable decision reason label.
    pub reason: String,
    /// Reward fed to the bandit.
    pub reward: Option<u8>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Per-episode outcomes, in order.
    pub episodes: Vec<EpisodeSummary>,
    /// True when the proposer ran out before the requested episode count.
    pub proposer_exhausted: bool,
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs episodes against a workspace with the given proposer.
///
/// # Errors
///
/// Returns [`EpisodeError`] on workspace, ledger, bandit, or proposer
/// failures. Gate denials are not errors; they are recorded outcomes.
pub fn run_episodes(
    options: &RunOptions,
    proposer: &mut dyn Proposer,
) -> Result<RunSummary, EpisodeError> {
    let workspace = options
        .workspace
        .canonicalize()
        .map_err(|err| EpisodeError::Workspace(format!("{}: {err}", options.workspace.display())))?;

    let bandit = SqliteBanditStore::open(&SqliteBanditConfig::new(&options.bandit_path))?;
    for arm in &options.arms {
        bandit.register_arm(&ArmId::new(arm.clone()))?;
    }
    let mut ledger = LedgerWriter::open(&options.ledger_path, &options.checkpoint_path)?;
    let gate = Gate::new(options.key.clone());

    let mut summaries: Vec<EpisodeSummary> = Vec::new();
    let mut proposer_exhausted = false;

    for index in 0..options.episodes {
        if options.cancel.is_cancelled() {
            break;
        }
        let episode_id = EpisodeId::new(format!("ep-{:04}", index + 1));
        let snapshot = StateSnapshot::new(workspace.clone());

        append(&mut ledger, EventType::EpisodeBegin, &EpisodeBeginPayload {
            episode_id: episode_id.clone(),
            snapshot: snapshot.clone(),
        })?;

        let arm = bandit.select(u64::from(index))?;
        let Some(arm) = arm else {
            end_episode(&mut ledger, &episode_id, EpisodeStatus::Completed, None)?;
            summaries.push(EpisodeSummary {
                episode_id,
                arm: None,
                allowed: false,
                reason: "no_enabled_arms".to_string(),
                reward: None,
            });
            continue;
        };

        let proposal = match proposer.propose(&snapshot, &arm) {
            Ok(proposal) => proposal,
            Err(ProposeError::Exhausted) => {
                end_episode(&mut ledger, &episode_id, EpisodeStatus::Completed, None)?;
                proposer_exhausted = true;
                summaries.push(EpisodeSummary {
                    episode_id,
                    arm: Some(arm),
                    allowed: false,
                    reason: "proposer_exhausted".to_string(),
                    reward: None,
                });
                break;
            }
            Err(err) => return Err(EpisodeError::Proposer(err.to_string())),
        };

        append(&mut ledger, EventType::ProposalSeen, &ProposalSeenPayload {
            episode_id: episode_id.clone(),
            snapshot: snapshot.clone(),
            proposal: proposal.clone(),
        })?;

        let decision = gate.evaluate(&snapshot, &proposal);
        append(&mut ledger, EventType::GateDecision, &GateDecisionPayload {
            episode_id: episode_id.clone(),
            decision: decision.clone(),
        })?;

        let reward = if decision.allowed {
            let mut controller = Controller::new(
                workspace.clone(),
                options.key.clone(),
                options.limits,
                Box::new(SubprocessRunner::new()),
            )
            .with_cancel(options.cancel.clone());
            let results = controller.execute(&decision);
            let mut all_ok = !results.is_empty();
            for result in results {
                all_ok = all_ok && result.ok;
                append(&mut ledger, EventType::ExecResult, &ExecResultPayload {
                    episode_id: episode_id.clone(),
                    result,
                })?;
            }
            u8::from(all_ok)
        } else {
            0
        };

        bandit.update(&arm, reward, &episode_id)?;
        let status = if options.cancel.is_cancelled() {
            EpisodeStatus::Cancelled
        } else {
            EpisodeStatus::Completed
        };
        end_episode(&mut ledger, &episode_id, status, Some(reward))?;

        summaries.push(EpisodeSummary {
            episode_id,
            arm: Some(arm),
            allowed: decision.allowed,
            reason: decision.reason.as_str().to_string(),
            reward: Some(reward),
        });
    }

    Ok(RunSummary {
        episodes: summaries,
        proposer_exhausted,
    })
}

// ============================================================================
// SECTION: Append Helpers
// ============================================================================

/// Serializes and appends one typed payload.
fn append<T: serde::Serialize>(
    ledger: &mut LedgerWriter,
    event_type: EventType,
    payload: &T,
) -> Result<(), EpisodeError> {
    let value = serde_json::to_value(payload).map_err(|err| EpisodeError::Encoding(err.to_string()))?;
    ledger.append(event_type, value)?;
    Ok(())
}

/// Appends the terminal episode marker.
fn end_episode(
    ledger: &mut LedgerWriter,
    episode_id: &EpisodeId,
    status: EpisodeStatus,
    reward: Option<u8>,
) -> Result<(), EpisodeError> {
    append(ledger, EventType::EpisodeEnd, &EpisodeEndPayload {
        episode_id: episode_id.clone(),
        status,
        reward,
    })
}
