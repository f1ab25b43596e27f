// crates/patch-warden-cli/src/main.rs
// ============================================================================
// Module: Patch Warden CLI Entry Point
// Description: Command dispatcher for episode runs and ledger replay.
// Purpose: Provide the `run` and `replay` surfaces with stable exit codes.
// Dependencies: clap, patch-warden-cli, patch-warden-core, patch-warden-ledger, rand
// ============================================================================

//! ## Overview
//! `patch-warden run` drives episodes against a workspace; `patch-warden
//! replay` verifies a ledger. Exit codes are part of the contract: 0
//! success, 2 ledger invalid, 3 gate divergence, 4 I/O error, 64 usage
//! error. The kernel key is read once at startup from `PATCH_WARDEN_KEY`
//! (64 hex characters) or generated fresh for the process; replaying a
//! ledger from another process requires the same key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use patch_warden_cli::FixtureProposer;
use patch_warden_cli::KernelConfig;
use patch_warden_cli::RunOptions;
use patch_warden_cli::run_episodes;
use patch_warden_cli::t;
use patch_warden_controller::CancelToken;
use patch_warden_core::KernelKey;
use patch_warden_ledger::ReplayVerdict;
use patch_warden_ledger::ReplayVerifier;

// ============================================================================
// SECTION: Exit Codes
// ============================================================================

/// Exit code for an invalid ledger.
const EXIT_LEDGER_INVALID: u8 = 2;
/// Exit code for gate divergence during replay.
const EXIT_GATE_DIVERGENCE: u8 = 3;
/// Exit code for I/O failures.
const EXIT_IO_ERROR: u8 = 4;
/// Exit code for usage errors.
const EXIT_USAGE: u8 = 64;

/// Environment variable carrying the kernel key (64 hex characters).
const KEY_ENV: &str = "PATCH_WARDEN_KEY";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "patch-warden", version, disable_help_subcommand = true)]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run episodes against a workspace.
    Run {
        /// Workspace root directory.
        #[arg(long)]
        workspace: PathBuf,
        /// Number of episodes to run.
        #[arg(long, default_value_t = 1)]
        episodes: u32,
        /// Directory of proposal JSON fixtures.
        #[arg(long, default_value = "proposals")]
        proposals: PathBuf,
        /// Optional TOML config path.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print per-episode progress lines.
        #[arg(long)]
        verbose: bool,
    },
    /// Verify a ledger's chain, signatures, and gate determinism.
    Replay {
        /// Ledger file to verify.
        #[arg(long)]
        ledger: PathBuf,
    },
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout through a checked handle.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(&mut stdout, "{message}")
}

/// Writes one line to stderr through a checked handle.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr().lock();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error line, ignoring secondary output failures.
fn emit_error(message: &str) {
    let _ = write_stderr_line(message);
}

// ============================================================================
// SECTION: Key Material
// ============================================================================

/// Resolves the kernel key: environment first, fresh random otherwise.
fn resolve_key() -> Result<KernelKey, String> {
    match std::env::var(KEY_ENV) {
        Ok(hex) => KernelKey::from_hex(hex.trim()).ok_or_else(|| t!("key.invalid")),
        Err(_) => Ok(KernelKey::from_bytes(rand::random())),
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version requests are successful exits, not usage
            // errors.
            if err.use_stderr() {
                emit_error(&t!("main.usage_error", error = err));
                return ExitCode::from(EXIT_USAGE);
            }
            let _ = write_stdout_line(&err.to_string());
            return ExitCode::SUCCESS;
        }
    };

    match cli.command {
        Commands::Run {
            workspace,
            episodes,
            proposals,
            config,
            verbose,
        } => run_command(&workspace, episodes, &proposals, config.as_deref(), verbose),
        Commands::Replay {
            ledger,
        } => replay_command(&ledger),
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` subcommand.
fn run_command(
    workspace: &std::path::Path,
    episodes: u32,
    proposals: &std::path::Path,
    config: Option<&std::path::Path>,
    verbose: bool,
) -> ExitCode {
    let config = match config {
        Some(path) => match KernelConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                emit_error(&t!("config.load_failed", error = err));
                return ExitCode::from(EXIT_USAGE);
            }
        },
        None => KernelConfig::built_in(),
    };
    let key = match resolve_key() {
        Ok(key) => key,
        Err(message) => {
            emit_error(&message);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if verbose {
        let _ = write_stdout_line(&t!(
            "run.starting",
            episodes = episodes,
            workspace = workspace.display()
        ));
    }

    let options = RunOptions {
        workspace: workspace.to_path_buf(),
        episodes,
        key,
        limits: config.limits,
        ledger_path: config.ledger_path.clone(),
        checkpoint_path: config.checkpoint_path.clone(),
        bandit_path: config.bandit_path.clone(),
        arms: config.arms.clone(),
        cancel: CancelToken::new(),
    };
    let mut proposer = FixtureProposer::from_dir(proposals);

    match run_episodes(&options, &mut proposer) {
        Ok(summary) => {
            if verbose {
                for episode in &summary.episodes {
                    let _ = write_stdout_line(&t!(
                        "run.episode.done",
                        episode = episode.episode_id,
                        arm = episode.arm.as_ref().map_or("-", |arm| arm.as_str()),
                        decision = episode.reason,
                        reward = episode.reward.map_or("-".to_string(), |r| r.to_string()),
                    ));
                }
            }
            let _ = write_stdout_line(&t!(
                "run.summary",
                count = summary.episodes.len(),
                ledger = config.ledger_path.display()
            ));
            ExitCode::SUCCESS
        }
        Err(err) => {
            emit_error(&t!("run.failed", error = err));
            ExitCode::from(EXIT_IO_ERROR)
        }
    }
}

// ============================================================================
// SECTION: Replay Command
// ============================================================================

/// Executes the `replay` subcommand, mapping verdicts onto exit codes.
fn replay_command(ledger: &std::path::Path) -> ExitCode {
    let key = match resolve_key() {
        Ok(key) => key,
        Err(message) => {
            emit_error(&message);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    match ReplayVerifier::new(key).verify(ledger) {
        Ok(report) if report.valid => {
            let _ = write_stdout_line(&t!("replay.valid", count = report.entry_count));
            ExitCode::SUCCESS
        }
        Ok(report) => {
            let seq = report.first_divergence.map_or(0, |entry| entry.seq);
            emit_error(&t!("replay.invalid", reason = report.reason.as_str(), seq = seq));
            if report.reason == ReplayVerdict::GateDivergence {
                ExitCode::from(EXIT_GATE_DIVERGENCE)
            } else {
                ExitCode::from(EXIT_LEDGER_INVALID)
            }
        }
        Err(err) => {
            emit_error(&t!("replay.io_error", error = err));
            ExitCode::from(EXIT_IO_ERROR)
        }
    }
}
