//! Snapshot/delta alignment state machine
//!
//! Anchors a book on a REST snapshot and walks the buffered deltas:
//!
//! ```text
//!   DISCARD ──(seqId > snapshot)──► ALIGN_FIRST_EVENT ──(prevSeqId <= snapshot)──► STRICT
//!      │ seqId <= snapshot                   │ otherwise                              │ prevSeqId == lastSeqId
//!      └─► discard                           └─► ALIGN_GAP_FATAL                      └─► apply, else ALIGN_GAP_FATAL
//! ```
//!
//! An in-stream snapshot follows the same ordering: a stale one is discarded
//! in `DISCARD`, and one that does not advance `lastSeqId` in `STRICT` is fatal.
//!
//! Every check runs before the book is touched, so a fatal message leaves
//! no trace. Once halted the machine rejects every further message, and the
//! book is only released through [`AlignmentMachine::finish`] on success.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use types::ids::SeqId;

use crate::events::{BookMessage, Level};
use crate::order_book::BookState;

/// Alignment phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Before the first delta that passes the snapshot.
    Discard,
    /// Evaluating the delta expected to straddle the snapshot.
    AlignFirstEvent,
    /// Steady-state: every delta must chain onto `lastSeqId`.
    Strict,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Discard => "DISCARD",
            Phase::AlignFirstEvent => "ALIGN_FIRST_EVENT",
            Phase::Strict => "STRICT",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sequence-integrity violation. Terminal for the session.
///
/// `index` is the 0-based position of the offending message in application
/// order (after dedup and reordering).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GapFault {
    #[error(
        "message #{index}: first event seqId={seq_id} prevSeqId={prev_seq_id} does not straddle \
         snapshot seqId={snapshot_seq_id} (expected prevSeqId <= {snapshot_seq_id}, gap {gap})"
    )]
    BridgeMismatch {
        index: u64,
        seq_id: SeqId,
        prev_seq_id: SeqId,
        snapshot_seq_id: SeqId,
        gap: i64,
    },

    #[error(
        "message #{index}: seqId={seq_id} prevSeqId={prev_seq_id} does not continue \
         lastSeqId={expected} (gap {gap})"
    )]
    ChainBreak {
        index: u64,
        seq_id: SeqId,
        prev_seq_id: SeqId,
        expected: SeqId,
        gap: i64,
    },

    #[error(
        "message #{index}: in-stream snapshot seqId={seq_id} does not advance \
         lastSeqId={last_seq_id}"
    )]
    StaleSnapshot {
        index: u64,
        seq_id: SeqId,
        last_seq_id: SeqId,
    },

    #[error(
        "no delta advanced past snapshot seqId={snapshot_seq_id} \
         ({discarded} discarded, stream ended in DISCARD)"
    )]
    NoBridgingEvent { snapshot_seq_id: SeqId, discarded: u64 },
}

impl GapFault {
    /// Phase the machine was in when the fault fired.
    pub fn phase(&self) -> Phase {
        match self {
            GapFault::BridgeMismatch { .. } => Phase::AlignFirstEvent,
            GapFault::ChainBreak { .. } | GapFault::StaleSnapshot { .. } => Phase::Strict,
            GapFault::NoBridgingEvent { .. } => Phase::Discard,
        }
    }

    /// Observed minus expected `prevSeqId`, where applicable.
    pub fn gap(&self) -> Option<i64> {
        match self {
            GapFault::BridgeMismatch { gap, .. } | GapFault::ChainBreak { gap, .. } => Some(*gap),
            GapFault::StaleSnapshot { .. } | GapFault::NoBridgingEvent { .. } => None,
        }
    }
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Stale delta dropped in `DISCARD`.
    Discarded,
    /// Delta applied; carries the new `lastSeqId`.
    Applied(SeqId),
    /// In-stream snapshot replaced the book.
    Reanchored(SeqId),
}

/// Run statistics of a finished alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentStats {
    pub snapshot_seq_id: SeqId,
    pub discarded: u64,
    pub applied: u64,
    pub first_event_seq_id: Option<SeqId>,
    pub final_seq_id: SeqId,
}

/// Book and statistics of a successful alignment.
#[derive(Debug, Clone)]
pub struct AlignedBook {
    pub book: BookState,
    pub stats: AlignmentStats,
}

/// Drives one book from snapshot through the buffered deltas.
#[derive(Debug)]
pub struct AlignmentMachine {
    book: BookState,
    snapshot_seq_id: SeqId,
    last_seq_id: SeqId,
    phase: Phase,
    first_event_seq_id: Option<SeqId>,
    discarded: u64,
    applied: u64,
    position: u64,
    halted: Option<GapFault>,
}

impl AlignmentMachine {
    /// Seed the machine from the anchoring snapshot. Starts in `DISCARD`.
    pub fn anchor(seq_id: SeqId, bids: &[Level], asks: &[Level]) -> Self {
        let mut book = BookState::new();
        book.snapshot(bids, asks);

        info!(
            snapshot_seq_id = %seq_id,
            bid_levels = book.bid_depth(),
            ask_levels = book.ask_depth(),
            "Alignment anchored on snapshot"
        );

        Self {
            book,
            snapshot_seq_id: seq_id,
            last_seq_id: seq_id,
            phase: Phase::Discard,
            first_event_seq_id: None,
            discarded: 0,
            applied: 0,
            position: 0,
            halted: None,
        }
    }

    /// Feed the next message in application order.
    pub fn step(&mut self, message: BookMessage) -> Result<Step, GapFault> {
        if let Some(fault) = &self.halted {
            return Err(fault.clone());
        }

        let index = self.position;
        self.position += 1;

        match message {
            BookMessage::Snapshot { seq_id, bids, asks } => {
                self.check_snapshot(index, seq_id)?;
                if self.phase == Phase::Discard && seq_id <= self.snapshot_seq_id {
                    self.discarded += 1;
                    debug!(index, seq_id = %seq_id, "Discarding stale in-stream snapshot");
                    return Ok(Step::Discarded);
                }
                self.book.snapshot(&bids, &asks);
                self.last_seq_id = seq_id;
                self.phase = Phase::Strict;
                self.applied += 1;
                info!(index, seq_id = %seq_id, "In-stream snapshot replaced book");
                Ok(Step::Reanchored(seq_id))
            }
            BookMessage::Update {
                seq_id,
                prev_seq_id,
                bids,
                asks,
            } => {
                self.check_update(index, seq_id, prev_seq_id)?;
                let Some(step) = self.admit_update(index, seq_id) else {
                    return Ok(Step::Discarded);
                };
                self.book.apply_levels(&bids, &asks);
                Ok(step)
            }
        }
    }

    /// Validate an update against the current phase without mutating the book.
    fn check_update(&mut self, index: u64, seq_id: SeqId, prev_seq_id: SeqId) -> Result<(), GapFault> {
        let fault = match self.phase {
            Phase::Discard if seq_id <= self.snapshot_seq_id => return Ok(()),
            Phase::Discard | Phase::AlignFirstEvent => {
                self.phase = Phase::AlignFirstEvent;
                if prev_seq_id <= self.snapshot_seq_id {
                    return Ok(());
                }
                GapFault::BridgeMismatch {
                    index,
                    seq_id,
                    prev_seq_id,
                    snapshot_seq_id: self.snapshot_seq_id,
                    gap: prev_seq_id.distance_from(self.snapshot_seq_id),
                }
            }
            Phase::Strict => {
                if prev_seq_id == self.last_seq_id {
                    return Ok(());
                }
                GapFault::ChainBreak {
                    index,
                    seq_id,
                    prev_seq_id,
                    expected: self.last_seq_id,
                    gap: prev_seq_id.distance_from(self.last_seq_id),
                }
            }
        };

        error!(
            phase = %self.phase,
            index,
            seq_id = %seq_id,
            prev_seq_id = %prev_seq_id,
            last_seq_id = %self.last_seq_id,
            gap = ?fault.gap(),
            "ALIGN_GAP_FATAL"
        );
        self.halted = Some(fault.clone());
        Err(fault)
    }

    /// An in-stream snapshot must not move `lastSeqId` backwards once `STRICT`.
    fn check_snapshot(&mut self, index: u64, seq_id: SeqId) -> Result<(), GapFault> {
        if self.phase != Phase::Strict || seq_id > self.last_seq_id {
            return Ok(());
        }

        let fault = GapFault::StaleSnapshot {
            index,
            seq_id,
            last_seq_id: self.last_seq_id,
        };
        error!(
            phase = %self.phase,
            index,
            seq_id = %seq_id,
            last_seq_id = %self.last_seq_id,
            "ALIGN_GAP_FATAL"
        );
        self.halted = Some(fault.clone());
        Err(fault)
    }

    /// Bookkeeping for an update that passed `check_update`. `None` means discard.
    fn admit_update(&mut self, index: u64, seq_id: SeqId) -> Option<Step> {
        match self.phase {
            Phase::Discard => {
                self.discarded += 1;
                debug!(index, seq_id = %seq_id, "Discarding stale delta");
                None
            }
            Phase::AlignFirstEvent => {
                self.first_event_seq_id = Some(seq_id);
                self.phase = Phase::Strict;
                self.last_seq_id = seq_id;
                self.applied += 1;
                info!(index, seq_id = %seq_id, "First event bridges snapshot, entering STRICT");
                Some(Step::Applied(seq_id))
            }
            Phase::Strict => {
                self.last_seq_id = seq_id;
                self.applied += 1;
                debug!(index, seq_id = %seq_id, "Delta applied");
                Some(Step::Applied(seq_id))
            }
        }
    }

    /// Close the session. Succeeds only in `STRICT` with no fault recorded.
    pub fn finish(self) -> Result<AlignedBook, GapFault> {
        if let Some(fault) = self.halted {
            return Err(fault);
        }
        if self.phase != Phase::Strict {
            let fault = GapFault::NoBridgingEvent {
                snapshot_seq_id: self.snapshot_seq_id,
                discarded: self.discarded,
            };
            error!(phase = %self.phase, %fault, "ALIGN_GAP_FATAL");
            return Err(fault);
        }

        let stats = AlignmentStats {
            snapshot_seq_id: self.snapshot_seq_id,
            discarded: self.discarded,
            applied: self.applied,
            first_event_seq_id: self.first_event_seq_id,
            final_seq_id: self.last_seq_id,
        };

        info!(
            discarded = stats.discarded,
            applied = stats.applied,
            final_seq_id = %stats.final_seq_id,
            "Alignment complete"
        );

        Ok(AlignedBook {
            book: self.book,
            stats,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_seq_id(&self) -> SeqId {
        self.last_seq_id
    }

    pub fn snapshot_seq_id(&self) -> SeqId {
        self.snapshot_seq_id
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    #[cfg(test)]
    pub(crate) fn book(&self) -> &BookState {
        &self.book
    }
}
