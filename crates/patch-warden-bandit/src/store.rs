// crates/patch-warden-bandit/src/store.rs
// ============================================================================
// Module: SQLite Bandit Store
// Description: Durable arm posteriors and outcome log backed by SQLite WAL.
// Purpose: Persist bandit learning transactionally across processes.
// Dependencies: patch-warden-core, rusqlite, thiserror, crate::sampler
// ============================================================================

//! ## Overview
//! The store owns a single `SQLite` connection behind a mutex: reads and
//! writes are single-writer by construction. Every `update` runs in one
//! transaction that bumps the arm posterior and appends an outcome row, so a
//! crash can never record a reward without its posterior change. Loads fail
//! closed on schema mismatches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use patch_warden_core::ArmId;
use patch_warden_core::EpisodeId;
use rusqlite::Connection;
use rusqlite::params;
use thiserror::Error;

use crate::sampler::ArmPosterior;
use crate::sampler::BanditState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the bandit store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` bandit store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
#[derive(Debug, Clone)]
pub struct SqliteBanditConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteBanditConfig {
    /// Creates a config with default timeouts.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Bandit store failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SqliteBanditError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Store contents or inputs violate an invariant.
    #[error("invalid bandit store state: {0}")]
    Invalid(String),
    /// Update referenced an unregistered arm.
    #[error("unknown arm: {0}")]
    UnknownArm(String),
    /// The internal mutex was poisoned by a panicking thread.
    #[error("bandit store lock poisoned")]
    LockPoisoned,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable Thompson-sampling store.
///
/// # Invariants
/// - Single connection behind a mutex: one writer at a time.
/// - `alpha`/`beta` never decrease.
#[derive(Debug)]
pub struct SqliteBanditStore {
    /// Guarded connection; the mutex makes the store single-writer.
    conn: Mutex<Connection>,
}

impl SqliteBanditStore {
    /// Opens (creating if needed) the store and migrates the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteBanditError`] when the database cannot be opened or
    /// carries an unsupported schema version.
    pub fn open(config: &SqliteBanditConfig) -> Result<Self, SqliteBanditError> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| SqliteBanditError::Invalid(err.to_string()))?;
        }
        let conn = Connection::open(&config.path)?;
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "synchronous", "full")?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Registers an arm at the uniform prior when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteBanditError`] on database failures.
    pub fn register_arm(&self, arm: &ArmId) -> Result<(), SqliteBanditError> {
        let conn = self.conn.lock().map_err(|_| SqliteBanditError::LockPoisoned)?;
        conn.execute(
            "INSERT OR IGNORE INTO arms (arm_id, alpha, beta, updated_at) VALUES (?1, 1, 1, ?2)",
            params![arm.as_str(), unix_seconds()],
        )?;
        Ok(())
    }

    /// Loads every arm posterior into an in-memory state.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteBanditError::Invalid`] when stored parameters violate
    /// the prior floor.
    pub fn load_state(&self) -> Result<BanditState, SqliteBanditError> {
        let conn = self.conn.lock().map_err(|_| SqliteBanditError::LockPoisoned)?;
        let mut statement = conn.prepare("SELECT arm_id, alpha, beta FROM arms ORDER BY arm_id")?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;

        let mut arms: BTreeMap<ArmId, ArmPosterior> = BTreeMap::new();
        for row in rows {
            let (arm_id, alpha, beta) = row?;
            if alpha < 1 || beta < 1 {
                return Err(SqliteBanditError::Invalid(format!(
                    "arm {arm_id} carries parameters below the prior: ({alpha}, {beta})"
                )));
            }
            arms.insert(ArmId::new(arm_id), ArmPosterior {
                alpha: u64::try_from(alpha).unwrap_or(1),
                beta: u64::try_from(beta).unwrap_or(1),
            });
        }
        Ok(BanditState {
            arms,
        })
    }

    /// Thompson-samples one arm under a caller-supplied seed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteBanditError`] when posteriors cannot be loaded.
    pub fn select(&self, seed: u64) -> Result<Option<ArmId>, SqliteBanditError> {
        Ok(self.load_state()?.select(seed))
    }

    /// Applies one binary reward transactionally and logs the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteBanditError::Invalid`] for rewards outside `{0, 1}`
    /// and [`SqliteBanditError::UnknownArm`] for unregistered arms.
    pub fn update(
        &self,
        arm: &ArmId,
        reward: u8,
        episode: &EpisodeId,
    ) -> Result<(), SqliteBanditError> {
        if reward > 1 {
            return Err(SqliteBanditError::Invalid(format!("reward must be 0 or 1, got {reward}")));
        }
        let mut conn = self.conn.lock().map_err(|_| SqliteBanditError::LockPoisoned)?;
        let tx = conn.transaction()?;
        let changed = if reward == 1 {
            tx.execute(
                "UPDATE arms SET alpha = alpha + 1, updated_at = ?2 WHERE arm_id = ?1",
                params![arm.as_str(), unix_seconds()],
            )?
        } else {
            tx.execute(
                "UPDATE arms SET beta = beta + 1, updated_at = ?2 WHERE arm_id = ?1",
                params![arm.as_str(), unix_seconds()],
            )?
        };
        if changed == 0 {
            return Err(SqliteBanditError::UnknownArm(arm.as_str().to_string()));
        }
        tx.execute(
            "INSERT INTO outcomes (ts, arm_id, reward, episode_id) VALUES (?1, ?2, ?3, ?4)",
            params![unix_seconds(), arm.as_str(), i64::from(reward), episode.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Returns the number of recorded outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteBanditError`] on database failures.
    pub fn outcome_count(&self) -> Result<u64, SqliteBanditError> {
        let conn = self.conn.lock().map_err(|_| SqliteBanditError::LockPoisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM outcomes", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Creates or validates the store schema.
fn migrate(conn: &Connection) -> Result<(), SqliteBanditError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
             key TEXT PRIMARY KEY,
             value INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS arms (
             arm_id TEXT PRIMARY KEY,
             alpha INTEGER NOT NULL,
             beta INTEGER NOT NULL,
             updated_at INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS outcomes (
             seq INTEGER PRIMARY KEY AUTOINCREMENT,
             ts INTEGER NOT NULL,
             arm_id TEXT NOT NULL,
             reward INTEGER NOT NULL,
             episode_id TEXT NOT NULL
         );",
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION],
    )?;
    let version: i64 =
        conn.query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
            row.get(0)
        })?;
    if version != SCHEMA_VERSION {
        return Err(SqliteBanditError::Invalid(format!(
            "unsupported schema version {version} (expected {SCHEMA_VERSION})"
        )));
    }
    Ok(())
}

/// Returns unix seconds for `updated_at`/`ts` columns.
fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
