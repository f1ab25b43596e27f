// crates/patch-warden-ledger/src/reader.rs
// ============================================================================
// Module: Ledger Reader
// Description: Strict line-by-line scanning shared by recovery and replay.
// Purpose: Distinguish a recoverable tail from corruption before it.
// Dependencies: serde_json, crate::entry
// ============================================================================

//! ## Overview
//! Scanning parses each LF-delimited line and verifies its chain hash. A
//! failure on the *final* line is recoverable (the writer truncates it); a
//! failure anywhere earlier is corruption and fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

use crate::entry::GENESIS_PREV_HASH;
use crate::entry::LedgerEntry;
use crate::entry::compute_entry_hash;
use crate::writer::LedgerError;

// ============================================================================
// SECTION: Scan Results
// ============================================================================

/// Outcome of scanning a ledger file.
#[derive(Debug)]
pub struct LedgerScan {
    /// Entries that parsed and chain-verified, in order.
    pub entries: Vec<LedgerEntry>,
    /// Byte length of the verified prefix (truncation point for recovery).
    pub valid_bytes: u64,
    /// Sequence position of a corrupt non-tail entry, when one was found.
    pub corrupt_before_tail: Option<u64>,
}

// ============================================================================
// SECTION: Scanning
// ============================================================================

/// Scans a ledger file from an open handle.
///
/// # Errors
///
/// Returns [`LedgerError::Io`] when the file cannot be read.
pub fn scan_file(file: &mut File) -> Result<LedgerScan, LedgerError> {
    file.seek(SeekFrom::Start(0))?;
    let mut raw = String::new();
    file.read_to_string(&mut raw)?;
    Ok(scan_text(&raw))
}

/// Scans a ledger file by path.
///
/// # Errors
///
/// Returns [`LedgerError::Io`] when the file cannot be opened or read.
pub fn scan_path(path: &Path) -> Result<LedgerScan, LedgerError> {
    let mut file = File::open(path)?;
    scan_file(&mut file)
}

/// Scans raw ledger text and verifies the chain prefix.
#[must_use]
pub fn scan_text(raw: &str) -> LedgerScan {
    let mut entries: Vec<LedgerEntry> = Vec::new();
    let mut valid_bytes: u64 = 0;
    let mut expected_seq: u64 = 0;
    let mut expected_prev = GENESIS_PREV_HASH.to_string();
    let mut corrupt_before_tail = None;

    let mut offset: usize = 0;
    let mut remaining = raw;
    loop {
        let Some(newline_at) = remaining.find('\n') else {
            // Trailing bytes without a newline are a partial append.
            break;
        };
        let line = &remaining[..newline_at];
        let consumed = newline_at + 1;
        let is_last_line = remaining[consumed..].trim().is_empty();

        match verify_line(line, expected_seq, &expected_prev) {
            Some(entry) => {
                expected_seq = entry.seq + 1;
                expected_prev = entry.entry_hash.clone();
                entries.push(entry);
                offset += consumed;
                valid_bytes = u64::try_from(offset).unwrap_or(u64::MAX);
            }
            None => {
                if !is_last_line {
                    corrupt_before_tail = Some(expected_seq);
                }
                break;
            }
        }
        remaining = &raw[offset..];
        if remaining.is_empty() {
            break;
        }
    }

    LedgerScan {
        entries,
        valid_bytes,
        corrupt_before_tail,
    }
}

/// Parses and chain-verifies one line against the expected chain head.
fn verify_line(line: &str, expected_seq: u64, expected_prev: &str) -> Option<LedgerEntry> {
    let entry: LedgerEntry = serde_json::from_str(line).ok()?;
    if entry.seq != expected_seq || entry.prev_hash != expected_prev {
        return None;
    }
    let recomputed =
        compute_entry_hash(&entry.prev_hash, entry.seq, entry.ts, entry.event_type, &entry.payload)?;
    if recomputed != entry.entry_hash {
        return None;
    }
    Some(entry)
}

// ============================================================================
// SECTION: Raw Lines
// ============================================================================

/// Reads raw LF-delimited lines without verification (replay does its own).
///
/// # Errors
///
/// Returns [`LedgerError::Io`] when the file cannot be read.
pub fn read_raw_lines(path: &Path) -> Result<Vec<String>, LedgerError> {
    let raw = std::fs::read_to_string(path).map_err(LedgerError::Io)?;
    Ok(raw.lines().map(ToString::to_string).collect())
}
