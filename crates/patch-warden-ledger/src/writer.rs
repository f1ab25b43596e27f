// crates/patch-warden-ledger/src/writer.rs
// ============================================================================
// Module: Ledger Writer
// Description: Locked, fsynced, checkpointed append path with recovery.
// Purpose: Guarantee the chain on disk survives crashes mid-append.
// Dependencies: fs2, serde_json, thiserror, crate::{entry, reader}
// ============================================================================

//! ## Overview
//! Each append writes one line, flushes, and fsyncs before the call returns.
//! The writer holds an exclusive OS file lock for its lifetime; a second
//! writer fails with `LockContention`. On open, the tail is scanned: a
//! partial or corrupt final line is truncated and the sequence resumes at
//! the last good entry plus one. Every `CHECKPOINT_INTERVAL` appends, the
//! checkpoint file records `(seq, entry_hash)` and is fsynced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fs2::FileExt;
use serde_json::Value;
use thiserror::Error;

use crate::entry::EventType;
use crate::entry::GENESIS_PREV_HASH;
use crate::entry::LedgerEntry;
use crate::entry::compute_entry_hash;
use crate::reader;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of appends between checkpoint writes.
pub const CHECKPOINT_INTERVAL: u64 = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledger failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Filesystem operation failed.
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Another writer holds the exclusive lock.
    #[error("ledger is locked by another writer")]
    LockContention,
    /// An append could not be made durable.
    #[error("append failed: {0}")]
    AppendFailed(String),
    /// An entry before the tail failed to parse or verify.
    #[error("corrupt ledger entry at seq {seq}")]
    CorruptEntry {
        /// Sequence number (or position) of the corrupt entry.
        seq: u64,
    },
    /// A supplied entry does not extend the current chain head.
    #[error("stale chain: expected seq {expected_seq} on prev {expected_prev}")]
    StaleChain {
        /// Next sequence number the chain accepts.
        expected_seq: u64,
        /// Required predecessor hash.
        expected_prev: String,
    },
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Single-writer handle over one ledger file.
///
/// # Invariants
/// - Holds the exclusive file lock for its whole lifetime.
/// - `next_seq`/`prev_hash` always describe the durable chain head.
#[derive(Debug)]
pub struct LedgerWriter {
    /// Locked, append-positioned ledger file.
    file: File,
    /// Checkpoint file path.
    checkpoint_path: PathBuf,
    /// Sequence number the next append will use.
    next_seq: u64,
    /// Entry hash of the durable chain head.
    prev_hash: String,
    /// Appends since the last checkpoint write.
    since_checkpoint: u64,
}

impl LedgerWriter {
    /// Opens (creating if absent) a ledger file, locks it, and recovers the
    /// chain head from its tail.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::LockContention`] when another writer holds the
    /// lock, [`LedgerError::CorruptEntry`] when a non-tail entry fails
    /// verification, and [`LedgerError::Io`] on filesystem failures.
    pub fn open(path: &Path, checkpoint_path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        file.try_lock_exclusive().map_err(|_| LedgerError::LockContention)?;

        let scan = reader::scan_file(&mut file)?;
        if let Some(bad_seq) = scan.corrupt_before_tail {
            return Err(LedgerError::CorruptEntry {
                seq: bad_seq,
            });
        }
        // A partial final line is abandoned; the chain resumes after the
        // last entry that verified.
        file.set_len(scan.valid_bytes)?;
        file.seek(SeekFrom::End(0))?;

        let (next_seq, prev_hash) = match scan.entries.last() {
            Some(last) => (last.seq + 1, last.entry_hash.clone()),
            None => (0, GENESIS_PREV_HASH.to_string()),
        };
        Ok(Self {
            file,
            checkpoint_path: checkpoint_path.to_path_buf(),
            next_seq,
            prev_hash,
            since_checkpoint: 0,
        })
    }

    /// Returns the sequence number the next append will use.
    #[must_use]
    pub const fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Appends an event stamped with the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AppendFailed`] when the entry cannot be built
    /// or made durable.
    pub fn append(
        &mut self,
        event_type: EventType,
        payload: Value,
    ) -> Result<LedgerEntry, LedgerError> {
        let ts = unix_micros();
        self.append_at(ts, event_type, payload)
    }

    /// Appends an event with an explicit timestamp (unix microseconds).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AppendFailed`] when the entry cannot be built
    /// or made durable.
    pub fn append_at(
        &mut self,
        ts: u64,
        event_type: EventType,
        payload: Value,
    ) -> Result<LedgerEntry, LedgerError> {
        let seq = self.next_seq;
        let prev_hash = self.prev_hash.clone();
        let entry_hash = compute_entry_hash(&prev_hash, seq, ts, event_type, &payload)
            .ok_or_else(|| LedgerError::AppendFailed("payload not canonicalizable".to_string()))?;
        let entry = LedgerEntry {
            seq,
            ts,
            prev_hash,
            entry_hash,
            event_type,
            payload,
        };
        self.append_entry(&entry)?;
        Ok(entry)
    }

    /// Appends a fully built entry after checking it extends the chain head.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::StaleChain`] for duplicate sequence numbers or
    /// stale predecessor hashes, and [`LedgerError::AppendFailed`] when the
    /// write cannot be made durable.
    pub fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if entry.seq != self.next_seq || entry.prev_hash != self.prev_hash {
            return Err(LedgerError::StaleChain {
                expected_seq: self.next_seq,
                expected_prev: self.prev_hash.clone(),
            });
        }
        let expected = compute_entry_hash(
            &entry.prev_hash,
            entry.seq,
            entry.ts,
            entry.event_type,
            &entry.payload,
        );
        if expected.as_deref() != Some(entry.entry_hash.as_str()) {
            return Err(LedgerError::AppendFailed("entry hash does not reproduce".to_string()));
        }

        let mut line = serde_json::to_string(entry)
            .map_err(|err| LedgerError::AppendFailed(err.to_string()))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .and_then(|()| self.file.sync_all())
            .map_err(|err| LedgerError::AppendFailed(err.to_string()))?;

        self.next_seq = entry.seq + 1;
        self.prev_hash = entry.entry_hash.clone();
        self.since_checkpoint += 1;
        if self.since_checkpoint >= CHECKPOINT_INTERVAL {
            self.write_checkpoint(entry)?;
            self.since_checkpoint = 0;
        }
        Ok(())
    }

    /// Writes and fsyncs the checkpoint record for the given chain head.
    fn write_checkpoint(&self, head: &LedgerEntry) -> Result<(), LedgerError> {
        let record = serde_json::json!({
            "seq": head.seq,
            "entry_hash": head.entry_hash,
        });
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.checkpoint_path)?;
        let mut line = record.to_string();
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Returns the current unix time in microseconds.
fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
