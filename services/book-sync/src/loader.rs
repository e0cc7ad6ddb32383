//! Input loading for alignment sessions
//!
//! Reads the snapshot, the buffered delta file (one JSON line per message)
//! and the optional expected-stats lock. A file that does not exist is
//! reported as "needs data"; a file that exists but does not parse is
//! malformed input. Nothing is processed from a file that fails to load.

use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::error::SyncError;
use crate::events::{BookMessage, DeltaEnvelope, SnapshotFile};
use crate::lock::ExpectedStats;

/// Read a whole file, mapping "not found" to [`SyncError::NeedsData`].
pub(crate) fn read_required(path: &Path, what: &'static str) -> Result<String, SyncError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SyncError::NeedsData {
            what,
            path: path.to_path_buf(),
        },
        _ => SyncError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    })
}

/// Load the REST snapshot.
pub fn load_snapshot(path: &Path) -> Result<SnapshotFile, SyncError> {
    let text = read_required(path, "snapshot")?;
    let snapshot = parse_snapshot(&text, &path.display().to_string())?;

    info!(
        path = %path.display(),
        seq_id = %snapshot.seq_id,
        bid_levels = snapshot.bids.len(),
        ask_levels = snapshot.asks.len(),
        "Snapshot loaded"
    );
    Ok(snapshot)
}

pub fn parse_snapshot(text: &str, source_name: &str) -> Result<SnapshotFile, SyncError> {
    serde_json::from_str(text).map_err(|e| SyncError::Malformed {
        source_name: source_name.to_string(),
        line: e.line(),
        reason: e.to_string(),
    })
}

/// Load the buffered delta file.
pub fn load_buffer(path: &Path) -> Result<Vec<BookMessage>, SyncError> {
    let file = fs::File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SyncError::NeedsData {
            what: "delta buffer",
            path: path.to_path_buf(),
        },
        _ => SyncError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    })?;

    let messages = parse_buffer(file, &path.display().to_string())?;
    info!(path = %path.display(), messages = messages.len(), "Delta buffer loaded");
    Ok(messages)
}

/// Parse delta lines. Blank lines are skipped; line numbers are 1-based.
pub fn parse_buffer<R: Read>(reader: R, source_name: &str) -> Result<Vec<BookMessage>, SyncError> {
    let mut messages = Vec::new();

    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| SyncError::Malformed {
            source_name: source_name.to_string(),
            line: line_no,
            reason: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let malformed = |reason: String| SyncError::Malformed {
            source_name: source_name.to_string(),
            line: line_no,
            reason,
        };

        let envelope: DeltaEnvelope =
            serde_json::from_str(&line).map_err(|e| malformed(e.to_string()))?;
        let batch = envelope
            .into_messages()
            .map_err(|e| malformed(e.to_string()))?;

        debug!(line = line_no, messages = batch.len(), "Parsed delta line");
        messages.extend(batch);
    }

    Ok(messages)
}

/// Load an expected-stats lock. A lock that constrains nothing is rejected.
pub fn load_lock(path: &Path) -> Result<ExpectedStats, SyncError> {
    let text = read_required(path, "expected-stats lock")?;
    let source_name = path.display().to_string();

    let lock: ExpectedStats = serde_json::from_str(&text).map_err(|e| SyncError::Malformed {
        source_name: source_name.clone(),
        line: e.line(),
        reason: e.to_string(),
    })?;

    if lock.is_empty() {
        return Err(SyncError::Malformed {
            source_name,
            line: 1,
            reason: "lock carries no expected values".to_string(),
        });
    }

    info!(path = %path.display(), "Expected-stats lock loaded");
    Ok(lock)
}

/// Write a lock as pretty JSON.
pub fn write_lock(path: &Path, lock: &ExpectedStats) -> Result<(), SyncError> {
    let io_err = |message: String| SyncError::Io {
        path: path.to_path_buf(),
        message,
    };
    let body = serde_json::to_string_pretty(lock).map_err(|e| io_err(e.to_string()))?;
    fs::write(path, body + "\n").map_err(|e| io_err(e.to_string()))?;

    info!(path = %path.display(), "Expected-stats lock written");
    Ok(())
}
