// crates/patch-warden-cli/src/config.rs
// ============================================================================
// Module: Kernel Configuration
// Description: TOML-backed overrides for caps and persistence paths.
// Purpose: Keep every tunable in one validated, size-capped document.
// Dependencies: patch-warden-controller, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is optional: every field has a default, and the loader
//! refuses oversized files before parsing. Execution caps are re-validated
//! against their hard ceilings after deserialization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use patch_warden_controller::ExecLimits;
use patch_warden_controller::LimitsError;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted config file size.
pub const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("config I/O error: {0}")]
    Io(String),
    /// File exceeds the size cap.
    #[error("config file is {size} bytes (limit {limit})")]
    TooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum accepted size.
        limit: u64,
    },
    /// File is not valid TOML for the schema.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Limits violate a hard ceiling.
    #[error("config limits invalid: {0}")]
    Limits(#[from] LimitsError),
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Root configuration document.
///
/// # Invariants
/// - Every field is optional in the file; defaults apply per field.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelConfig {
    /// Execution caps.
    #[serde(default)]
    pub limits: ExecLimits,
    /// Ledger file path.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Checkpoint file path.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    /// Bandit database path.
    #[serde(default = "default_bandit_path")]
    pub bandit_path: PathBuf,
    /// Enabled strategy arms.
    #[serde(default = "default_arms")]
    pub arms: Vec<String>,
}

/// Returns the default ledger path.
fn default_ledger_path() -> PathBuf {
    PathBuf::from("run_logs/ledger.jsonl")
}

/// Returns the default checkpoint path.
fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("run_logs/checkpoint")
}

/// Returns the default bandit database path.
fn default_bandit_path() -> PathBuf {
    PathBuf::from("outcomes.sqlite")
}

/// Returns the default arm registry.
fn default_arms() -> Vec<String> {
    vec!["default".to_string()]
}

impl KernelConfig {
    /// Returns the built-in defaults.
    #[must_use]
    pub fn built_in() -> Self {
        Self {
            limits: ExecLimits::default(),
            ledger_path: default_ledger_path(),
            checkpoint_path: default_checkpoint_path(),
            bandit_path: default_bandit_path(),
            arms: default_arms(),
        }
    }

    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unreadable, oversized, unparsable, or
    /// out-of-ceiling documents.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::TooLarge {
                size: metadata.len(),
                limit: MAX_CONFIG_BYTES,
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let config: Self =
            toml::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.limits.validate()?;
        Ok(config)
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
        reason = "Test-only assertions are permitted."
    )]

    use super::KernelConfig;

    #[test]
    fn empty_document_yields_defaults() {
        let config: KernelConfig = toml::from_str("").expect("parse");
        assert_eq!(config.limits.action_wall_s, 60);
        assert_eq!(config.ledger_path.to_string_lossy(), "run_logs/ledger.jsonl");
        assert_eq!(config.arms, vec!["default".to_string()]);
    }

    #[test]
    fn partial_limits_merge_with_defaults() {
        let config: KernelConfig =
            toml::from_str("[limits]\naction_wall_s = 120\n").expect("parse");
        assert_eq!(config.limits.action_wall_s, 120);
        assert_eq!(config.limits.test_wall_s, 900);
    }

    #[test]
    fn over_ceiling_wall_clock_is_rejected() {
        let config: KernelConfig =
            toml::from_str("[limits]\naction_wall_s = 601\n").expect("parse");
        assert!(config.limits.validate().is_err());
    }
}
