//! One alignment session: Dedup → Reorder → Alignment → Digest
//!
//! A session owns every piece of mutable state it touches (dedup set, reorder
//! buffer, book), so independent sessions can run on separate threads with
//! nothing shared. Dropping a session at any point abandons it; its book is
//! only ever published through a successful [`AlignmentSession::finish`].

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span};
use types::ids::{InstrumentId, SeqId, SessionId};

use crate::alignment::{AlignedBook, AlignmentMachine, Phase};
use crate::config::FeedCapabilities;
use crate::dedup::{Admission, DedupFilter};
use crate::digest::{canonicalize, digest_prefix, CanonicalBook};
use crate::error::SyncError;
use crate::events::{BookMessage, SnapshotFile};
use crate::lock::ExpectedStats;
use crate::reorder::ReorderWindow;

/// Terminal status label of a successful run.
pub const STATUS_ALIGNED: &str = "ALIGNED";

/// Statistics of a finished session. Field names match the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(rename = "snapshot_seqId")]
    pub snapshot_seq_id: SeqId,
    pub buffer_messages_n: u64,
    pub duplicates_n: u64,
    pub discarded_n: u64,
    pub applied_n: u64,
    #[serde(rename = "align_first_event_seqId")]
    pub align_first_event_seq_id: Option<SeqId>,
    #[serde(rename = "final_seqId")]
    pub final_seq_id: SeqId,
    pub window_flushes: u64,
}

/// Published result of a successful session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<InstrumentId>,
    pub status: String,
    /// Whether an expected-stats lock was checked.
    pub verified: bool,
    pub stats: RunStats,
    pub book: CanonicalBook,
}

/// Pipeline state for one snapshot + buffered-delta pair.
#[derive(Debug)]
pub struct AlignmentSession {
    id: SessionId,
    instrument: Option<InstrumentId>,
    dedup: DedupFilter,
    window: ReorderWindow,
    machine: AlignmentMachine,
    received: u64,
}

impl AlignmentSession {
    /// Start a session anchored on `snapshot`.
    pub fn new(snapshot: &SnapshotFile, capabilities: &FeedCapabilities) -> Self {
        let id = SessionId::new();
        info!(
            session_id = %id,
            feed = capabilities.name.as_deref().unwrap_or("-"),
            snapshot_seq_id = %snapshot.seq_id,
            reorder_window = capabilities.reorder_window.get(),
            "Alignment session started"
        );

        Self {
            id,
            instrument: None,
            dedup: DedupFilter::new(),
            window: ReorderWindow::new(capabilities.reorder_window),
            machine: AlignmentMachine::anchor(snapshot.seq_id, &snapshot.bids, &snapshot.asks),
            received: 0,
        }
    }

    /// Tag the session with the instrument it reconstructs.
    pub fn with_instrument(mut self, instrument: InstrumentId) -> Self {
        self.instrument = Some(instrument);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn last_seq_id(&self) -> SeqId {
        self.machine.last_seq_id()
    }

    /// Duplicates dropped so far.
    pub fn duplicates(&self) -> u64 {
        self.dedup.duplicates()
    }

    /// Feed one raw message in arrival order.
    pub fn push(&mut self, message: BookMessage) -> Result<(), SyncError> {
        self.received += 1;

        if self.dedup.admit(message.seq_id()) == Admission::Duplicate {
            return Ok(());
        }

        if let Some(batch) = self.window.push(message) {
            self.apply_batch(batch)?;
        }
        Ok(())
    }

    /// Feed a whole buffer in arrival order.
    pub fn push_all<I>(&mut self, messages: I) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = BookMessage>,
    {
        for message in messages {
            self.push(message)?;
        }
        Ok(())
    }

    /// Flush the window, close the machine, and digest the book.
    pub fn finish(mut self) -> Result<SessionReport, SyncError> {
        if let Some(batch) = self.window.finish() {
            self.apply_batch(batch)?;
        }

        let AlignedBook { book, stats } = self.machine.finish()?;
        let canonical = canonicalize(&book);

        let stats = RunStats {
            snapshot_seq_id: stats.snapshot_seq_id,
            buffer_messages_n: self.received,
            duplicates_n: self.dedup.duplicates(),
            discarded_n: stats.discarded,
            applied_n: stats.applied,
            align_first_event_seq_id: stats.first_event_seq_id,
            final_seq_id: stats.final_seq_id,
            window_flushes: self.window.flushes(),
        };

        info!(
            session_id = %self.id,
            status = STATUS_ALIGNED,
            applied_n = stats.applied_n,
            discarded_n = stats.discarded_n,
            duplicates_n = stats.duplicates_n,
            final_seq_id = %stats.final_seq_id,
            digest = %digest_prefix(&canonical.digest),
            "Alignment session finished"
        );

        Ok(SessionReport {
            session_id: self.id,
            instrument: self.instrument,
            status: STATUS_ALIGNED.to_string(),
            verified: false,
            stats,
            book: canonical,
        })
    }

    /// Finish, then verify against `lock`. Any mismatch is fatal.
    pub fn finish_verified(self, lock: &ExpectedStats) -> Result<SessionReport, SyncError> {
        let mut report = self.finish()?;
        lock.verify(&report.stats, &report.book.digest)
            .map_err(SyncError::Verification)?;
        report.verified = true;
        Ok(report)
    }

    fn apply_batch(&mut self, batch: Vec<BookMessage>) -> Result<(), SyncError> {
        for message in batch {
            let seq_id = message.seq_id();
            let action = message.action();
            match self.machine.step(message) {
                Ok(step) => debug!(session_id = %self.id, action = action.label(), ?step, "Step"),
                Err(fault) => {
                    error!(
                        session_id = %self.id,
                        action = action.label(),
                        seq_id = %seq_id,
                        %fault,
                        "Session failed closed"
                    );
                    return Err(fault.into());
                }
            }
        }
        Ok(())
    }
}

/// Run a complete session over a materialized buffer.
pub fn run_session(
    snapshot: &SnapshotFile,
    messages: Vec<BookMessage>,
    capabilities: &FeedCapabilities,
    lock: Option<&ExpectedStats>,
) -> Result<SessionReport, SyncError> {
    let mut session = AlignmentSession::new(snapshot, capabilities);
    let span = info_span!("session", session_id = %session.id());
    let _guard = span.enter();

    session.push_all(messages)?;
    match lock {
        Some(lock) => session.finish_verified(lock),
        None => session.finish(),
    }
}
