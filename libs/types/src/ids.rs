//! Identifier types for feed messages and alignment sessions
//!
//! Sequence numbers are signed because the feed uses `-1` as the
//! `prevSeqId` of every snapshot message.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sequence number assigned by the exchange to a feed message.
///
/// Unique per feed and monotonically assigned. Ordering is plain integer
/// ordering; the reorder window sorts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeqId(i64);

impl SeqId {
    /// `prevSeqId` carried by every snapshot message.
    pub const SNAPSHOT_PREV: SeqId = SeqId(-1);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    /// Signed distance `self - other`, saturating at the i64 bounds.
    pub fn distance_from(self, other: SeqId) -> i64 {
        self.0.saturating_sub(other.0)
    }
}

impl fmt::Display for SeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SeqId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier of one alignment session.
///
/// Uses UUID v7 so log lines from parallel sessions sort by start time.
/// Carried in log fields only; never part of a digest or a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument a feed belongs to (e.g. "BTC-USDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Try to create an InstrumentId, returning None for a blank symbol
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.trim().is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
