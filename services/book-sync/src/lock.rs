//! Expected-stats lock
//!
//! A lock certifies a previous run. When one is supplied the session switches
//! from "compute and report" to "compute and verify-or-fail": every field the
//! lock carries is compared with the recomputed value, and any difference is
//! fatal even though alignment itself succeeded.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info};
use types::ids::SeqId;

use crate::digest::digest_prefix;
use crate::session::{RunStats, SessionReport};

/// One field whose locked value differs from the computed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMismatch {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl LockMismatch {
    pub fn new(field: &str, expected: impl ToString, actual: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl fmt::Display for LockMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, computed {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Expected run statistics. Absent fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedStats {
    #[serde(rename = "snapshot_seqId", default, skip_serializing_if = "Option::is_none")]
    pub snapshot_seq_id: Option<SeqId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_messages_n: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded_n: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_n: Option<u64>,

    /// `Some(None)` is an explicit `null`: the run must not have bridged.
    #[serde(
        rename = "align_first_event_seqId",
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub align_first_event_seq_id: Option<Option<SeqId>>,

    #[serde(rename = "final_seqId", default, skip_serializing_if = "Option::is_none")]
    pub final_seq_id: Option<SeqId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_book_digest_sha256: Option<String>,
}

impl ExpectedStats {
    /// Lock certifying the given successful run.
    pub fn from_report(report: &SessionReport) -> Self {
        let stats = &report.stats;
        Self {
            snapshot_seq_id: Some(stats.snapshot_seq_id),
            buffer_messages_n: Some(stats.buffer_messages_n),
            discarded_n: Some(stats.discarded_n),
            applied_n: Some(stats.applied_n),
            align_first_event_seq_id: Some(stats.align_first_event_seq_id),
            final_seq_id: Some(stats.final_seq_id),
            canonical_book_digest_sha256: Some(report.book.digest.clone()),
        }
    }

    /// Whether the lock constrains anything at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Compare every present field; collect all mismatches.
    pub fn verify(&self, stats: &RunStats, digest: &str) -> Result<(), Vec<LockMismatch>> {
        let mut mismatches = Vec::new();

        check(&mut mismatches, "snapshot_seqId", self.snapshot_seq_id, stats.snapshot_seq_id);
        check(&mut mismatches, "buffer_messages_n", self.buffer_messages_n, stats.buffer_messages_n);
        check(&mut mismatches, "discarded_n", self.discarded_n, stats.discarded_n);
        check(&mut mismatches, "applied_n", self.applied_n, stats.applied_n);
        check(&mut mismatches, "final_seqId", self.final_seq_id, stats.final_seq_id);

        if let Some(expected) = self.align_first_event_seq_id {
            if stats.align_first_event_seq_id != expected {
                mismatches.push(LockMismatch::new(
                    "align_first_event_seqId",
                    render_seq(expected),
                    render_seq(stats.align_first_event_seq_id),
                ));
            }
        }

        if let Some(expected) = &self.canonical_book_digest_sha256 {
            if !expected.eq_ignore_ascii_case(digest) {
                mismatches.push(LockMismatch::new(
                    "canonical_book_digest_sha256",
                    format!("{}…", digest_prefix(expected)),
                    format!("{}…", digest_prefix(digest)),
                ));
            }
        }

        if mismatches.is_empty() {
            info!(digest = %digest_prefix(digest), "Lock verified");
            Ok(())
        } else {
            for m in &mismatches {
                error!(
                    field = %m.field,
                    expected = %m.expected,
                    actual = %m.actual,
                    "Lock mismatch"
                );
            }
            Err(mismatches)
        }
    }
}

fn render_seq(seq_id: Option<SeqId>) -> String {
    seq_id
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Present-but-null becomes `Some(None)`; an absent field stays `None` via `default`.
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<SeqId>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<SeqId>::deserialize(deserializer).map(Some)
}

fn check<T: PartialEq + ToString>(
    mismatches: &mut Vec<LockMismatch>,
    field: &str,
    expected: Option<T>,
    actual: T,
) {
    if let Some(expected) = expected {
        if expected != actual {
            mismatches.push(LockMismatch::new(field, expected, actual));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> RunStats {
        RunStats {
            snapshot_seq_id: SeqId::new(100),
            buffer_messages_n: 2,
            duplicates_n: 0,
            discarded_n: 0,
            applied_n: 2,
            align_first_event_seq_id: Some(SeqId::new(101)),
            final_seq_id: SeqId::new(102),
            window_flushes: 1,
        }
    }

    const DIGEST: &str = "4c1f0a3e9d2b7c6a5f8e1d0c9b8a7f6e5d4c3b2a1f0e9d8c7b6a5f4e3d2c1b0a";

    #[test]
    fn test_parse_lock_file() {
        let json = r#"{
            "snapshot_seqId": 100,
            "buffer_messages_n": 2,
            "discarded_n": 0,
            "applied_n": 2,
            "align_first_event_seqId": 101,
            "final_seqId": 102,
            "canonical_book_digest_sha256": "abc"
        }"#;
        let lock: ExpectedStats = serde_json::from_str(json).unwrap();
        assert_eq!(lock.snapshot_seq_id, Some(SeqId::new(100)));
        assert_eq!(lock.align_first_event_seq_id, Some(Some(SeqId::new(101))));
        assert_eq!(lock.canonical_book_digest_sha256.as_deref(), Some("abc"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"applied": 2}"#;
        assert!(serde_json::from_str::<ExpectedStats>(json).is_err());
    }

    #[test]
    fn test_partial_lock_checks_present_fields_only() {
        let lock = ExpectedStats {
            applied_n: Some(2),
            ..Default::default()
        };
        assert!(lock.verify(&stats(), DIGEST).is_ok());
        assert!(!lock.is_empty());
        assert!(ExpectedStats::default().is_empty());
    }

    #[test]
    fn test_all_mismatches_collected() {
        let lock = ExpectedStats {
            discarded_n: Some(1),
            applied_n: Some(3),
            final_seq_id: Some(SeqId::new(103)),
            align_first_event_seq_id: Some(Some(SeqId::new(105))),
            ..Default::default()
        };

        let mismatches = lock.verify(&stats(), DIGEST).unwrap_err();
        let fields: Vec<&str> = mismatches.iter().map(|m| m.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["discarded_n", "applied_n", "final_seqId", "align_first_event_seqId"]
        );
        assert_eq!(mismatches[1].expected, "3");
        assert_eq!(mismatches[1].actual, "2");
    }

    #[test]
    fn test_digest_mismatch_reports_prefixes() {
        let lock = ExpectedStats {
            canonical_book_digest_sha256: Some("f".repeat(64)),
            ..Default::default()
        };

        let mismatches = lock.verify(&stats(), DIGEST).unwrap_err();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].expected, format!("{}…", "f".repeat(12)));
        assert_eq!(mismatches[0].actual, "4c1f0a3e9d2b…");
    }

    #[test]
    fn test_digest_comparison_ignores_case() {
        let lock = ExpectedStats {
            canonical_book_digest_sha256: Some(DIGEST.to_uppercase()),
            ..Default::default()
        };
        assert!(lock.verify(&stats(), DIGEST).is_ok());
    }

    #[test]
    fn test_missing_first_event_reported_as_none() {
        let mut computed = stats();
        computed.align_first_event_seq_id = None;
        let lock = ExpectedStats {
            align_first_event_seq_id: Some(Some(SeqId::new(101))),
            ..Default::default()
        };

        let mismatches = lock.verify(&computed, DIGEST).unwrap_err();
        assert_eq!(mismatches[0].actual, "none");
    }

    #[test]
    fn test_null_first_event_is_checked() {
        let lock: ExpectedStats =
            serde_json::from_str(r#"{"align_first_event_seqId": null}"#).unwrap();
        assert_eq!(lock.align_first_event_seq_id, Some(None));
        assert!(!lock.is_empty());

        let mismatches = lock.verify(&stats(), DIGEST).unwrap_err();
        assert_eq!(mismatches[0].expected, "none");
        assert_eq!(mismatches[0].actual, "101");

        let mut unbridged = stats();
        unbridged.align_first_event_seq_id = None;
        assert!(lock.verify(&unbridged, DIGEST).is_ok());
    }

    #[test]
    fn test_absent_first_event_is_unchecked() {
        let lock: ExpectedStats = serde_json::from_str(r#"{"applied_n": 2}"#).unwrap();
        assert_eq!(lock.align_first_event_seq_id, None);
    }

    #[test]
    fn test_certified_null_first_event_serializes_as_null() {
        let lock = ExpectedStats {
            align_first_event_seq_id: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_string(&lock).unwrap();
        assert_eq!(json, r#"{"align_first_event_seqId":null}"#);
        assert_eq!(serde_json::from_str::<ExpectedStats>(&json).unwrap(), lock);
    }

    #[test]
    fn test_serialized_lock_uses_wire_names() {
        let lock = ExpectedStats {
            snapshot_seq_id: Some(SeqId::new(100)),
            final_seq_id: Some(SeqId::new(102)),
            ..Default::default()
        };
        let json = serde_json::to_string(&lock).unwrap();
        assert_eq!(json, r#"{"snapshot_seqId":100,"final_seqId":102}"#);
    }
}
