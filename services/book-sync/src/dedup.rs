//! Duplicate suppression for one alignment session
//!
//! Runs ahead of the reorder window so a replayed message is caught no
//! matter where it lands in the arrival order. A duplicate is dropped with
//! no effect on book state, `lastSeqId` or phase.

use std::collections::HashSet;

use tracing::{debug, warn};
use types::ids::SeqId;

/// Result of presenting a sequence number to the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; pass the message downstream.
    Accepted,
    /// Already admitted earlier in this session; drop it.
    Duplicate,
}

/// Remembers every admitted sequence number for the life of a session.
#[derive(Debug, Default)]
pub struct DedupFilter {
    admitted: HashSet<SeqId>,
    accepted: u64,
    duplicates: u64,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `seq_id` or report it as a duplicate.
    pub fn admit(&mut self, seq_id: SeqId) -> Admission {
        if self.admitted.insert(seq_id) {
            self.accepted += 1;
            debug!(seq_id = %seq_id, "Message admitted");
            Admission::Accepted
        } else {
            self.duplicates += 1;
            warn!(
                seq_id = %seq_id,
                duplicates = self.duplicates,
                "Dropping duplicate message"
            );
            Admission::Duplicate
        }
    }

    /// Messages admitted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Duplicates dropped so far.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}
