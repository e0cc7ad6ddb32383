//! Error taxonomy for alignment sessions
//!
//! Every variant is fatal to the session that raised it. `NeedsData` is the
//! one outcome that does not mean "ran and failed": it tells the caller an
//! input file is not there yet.

use std::path::PathBuf;

use crate::alignment::GapFault;
use crate::config::ConfigError;
use crate::lock::LockMismatch;

/// Process exit code: aligned (and verified, when locked).
pub const EXIT_OK: u8 = 0;
/// Process exit code: any fatal alignment, verification, input or config error.
pub const EXIT_FATAL: u8 = 1;
/// Process exit code: a required input file is absent.
pub const EXIT_NEEDS_DATA: u8 = 3;

/// Session-terminating error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("malformed input in {source_name} line {line}: {reason}")]
    Malformed {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("{0}")]
    AlignGap(#[from] GapFault),

    #[error("lock verification failed: {}", describe_mismatches(.0))]
    Verification(Vec<LockMismatch>),

    #[error("needs data: {what} not found at {}", .path.display())]
    NeedsData { what: &'static str, path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("session for {instrument} panicked")]
    SessionPanicked { instrument: String },
}

impl SyncError {
    /// Status label printed by the CLI.
    pub fn status_label(&self) -> &'static str {
        match self {
            SyncError::Malformed { .. } => "INPUT_MALFORMED",
            SyncError::AlignGap(_) => "ALIGN_GAP_FATAL",
            SyncError::Verification(_) => "LOCK_MISMATCH",
            SyncError::NeedsData { .. } => "NEEDS_DATA",
            SyncError::Config(_) => "CONFIG_INVALID",
            SyncError::Io { .. } => "IO_ERROR",
            SyncError::SessionPanicked { .. } => "SESSION_PANICKED",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::NeedsData { .. } => EXIT_NEEDS_DATA,
            _ => EXIT_FATAL,
        }
    }

    pub fn is_needs_data(&self) -> bool {
        matches!(self, SyncError::NeedsData { .. })
    }
}

fn describe_mismatches(mismatches: &[LockMismatch]) -> String {
    mismatches
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::SeqId;

    #[test]
    fn test_exit_codes_are_distinct() {
        let gap = SyncError::AlignGap(GapFault::NoBridgingEvent {
            snapshot_seq_id: SeqId::new(1),
            discarded: 0,
        });
        let needs = SyncError::NeedsData {
            what: "snapshot",
            path: PathBuf::from("/tmp/none.json"),
        };

        assert_eq!(gap.exit_code(), EXIT_FATAL);
        assert_eq!(needs.exit_code(), EXIT_NEEDS_DATA);
        assert_ne!(EXIT_OK, EXIT_FATAL);
        assert!(needs.is_needs_data());
        assert!(!gap.is_needs_data());
    }

    #[test]
    fn test_status_labels() {
        let gap = SyncError::from(GapFault::NoBridgingEvent {
            snapshot_seq_id: SeqId::new(1),
            discarded: 0,
        });
        assert_eq!(gap.status_label(), "ALIGN_GAP_FATAL");
        assert_eq!(
            SyncError::from(ConfigError::ZeroReorderWindow).status_label(),
            "CONFIG_INVALID"
        );
    }

    #[test]
    fn test_panicked_session_is_fatal() {
        let err = SyncError::SessionPanicked {
            instrument: "BTC-USDT".to_string(),
        };
        assert_eq!(err.status_label(), "SESSION_PANICKED");
        assert_eq!(err.exit_code(), EXIT_FATAL);
        assert_eq!(err.to_string(), "session for BTC-USDT panicked");
    }

    #[test]
    fn test_verification_message_lists_every_field() {
        let err = SyncError::Verification(vec![
            LockMismatch::new("applied_n", "2", "3"),
            LockMismatch::new("final_seqId", "102", "103"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("applied_n"));
        assert!(msg.contains("final_seqId"));
    }

    #[test]
    fn test_needs_data_message_names_path() {
        let err = SyncError::NeedsData {
            what: "delta buffer",
            path: PathBuf::from("/data/buffer.jsonl"),
        };
        assert_eq!(
            err.to_string(),
            "needs data: delta buffer not found at /data/buffer.jsonl"
        );
    }
}
