//! Feed message definitions for the alignment engine
//!
//! `BookMessage` is the tagged variant every pipeline stage works with. The
//! wire shapes (`SnapshotFile`, `DeltaEnvelope`) mirror the exchange JSON and
//! convert into it; anything that does not fit is rejected here, before the
//! dedup layer sees it.

use serde::{Deserialize, Serialize};
use types::errors::DecimalError;
use types::ids::SeqId;
use types::numeric::{Price, Size};

/// Reasons a single `[price, size, ...]` array is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelError {
    #[error("price level needs at least 2 fields, got {0}")]
    TooShort(usize),

    #[error(transparent)]
    Decimal(#[from] DecimalError),
}

/// One `(price, size)` pair.
///
/// On the wire this is a JSON array. Fields past the second (order counts
/// on some venues) are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "(String, String)")]
pub struct Level {
    pub price: Price,
    pub size: Size,
}

impl Level {
    pub fn new(price: &str, size: &str) -> Result<Self, DecimalError> {
        Ok(Self {
            price: Price::new(price)?,
            size: Size::new(size)?,
        })
    }
}

impl TryFrom<Vec<String>> for Level {
    type Error = LevelError;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        let mut fields = fields.into_iter();
        match (fields.next(), fields.next()) {
            (Some(price), Some(size)) => Ok(Self {
                price: Price::new(price)?,
                size: Size::new(size)?,
            }),
            (Some(_), None) => Err(LevelError::TooShort(1)),
            _ => Err(LevelError::TooShort(0)),
        }
    }
}

impl From<Level> for (String, String) {
    fn from(level: Level) -> Self {
        (level.price.into(), level.size.into())
    }
}

/// A feed message after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookMessage {
    /// Full replacement of both sides at `seq_id`.
    Snapshot {
        seq_id: SeqId,
        bids: Vec<Level>,
        asks: Vec<Level>,
    },
    /// Incremental change continuing from `prev_seq_id`.
    Update {
        seq_id: SeqId,
        prev_seq_id: SeqId,
        bids: Vec<Level>,
        asks: Vec<Level>,
    },
}

impl BookMessage {
    pub fn seq_id(&self) -> SeqId {
        match self {
            BookMessage::Snapshot { seq_id, .. } | BookMessage::Update { seq_id, .. } => *seq_id,
        }
    }

    /// `prevSeqId` as carried on the wire; `-1` for snapshots.
    pub fn prev_seq_id(&self) -> SeqId {
        match self {
            BookMessage::Snapshot { .. } => SeqId::SNAPSHOT_PREV,
            BookMessage::Update { prev_seq_id, .. } => *prev_seq_id,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            BookMessage::Snapshot { .. } => Action::Snapshot,
            BookMessage::Update { .. } => Action::Update,
        }
    }

    pub fn level_count(&self) -> usize {
        match self {
            BookMessage::Snapshot { bids, asks, .. } | BookMessage::Update { bids, asks, .. } => {
                bids.len() + asks.len()
            }
        }
    }
}

/// Action tag of a delta line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Snapshot,
    Update,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Snapshot => "snapshot",
            Action::Update => "update",
        }
    }
}

/// REST snapshot file: `{ seqId, bids, asks }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub seq_id: SeqId,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl SnapshotFile {
    pub fn into_message(self) -> BookMessage {
        BookMessage::Snapshot {
            seq_id: self.seq_id,
            bids: self.bids,
            asks: self.asks,
        }
    }
}

/// Reasons a structurally valid delta line is still rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("empty data array")]
    EmptyData,

    #[error("update seqId={seq_id} is missing prevSeqId")]
    MissingPrevSeqId { seq_id: SeqId },

    #[error("snapshot seqId={seq_id} carries prevSeqId={prev_seq_id}, expected -1")]
    SnapshotPrev { seq_id: SeqId, prev_seq_id: SeqId },

    #[error("update seqId={seq_id} does not advance past prevSeqId={prev_seq_id}")]
    NonIncreasing { seq_id: SeqId, prev_seq_id: SeqId },
}

/// One entry of a delta line's `data` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaData {
    pub seq_id: SeqId,
    #[serde(default)]
    pub prev_seq_id: Option<SeqId>,
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

/// One line of the buffered delta file: `{ action, data: [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEnvelope {
    pub action: Action,
    pub data: Vec<DeltaData>,
}

impl DeltaEnvelope {
    /// Convert every `data` entry into a message, in line order.
    pub fn into_messages(self) -> Result<Vec<BookMessage>, EnvelopeError> {
        if self.data.is_empty() {
            return Err(EnvelopeError::EmptyData);
        }

        let action = self.action;
        self.data
            .into_iter()
            .map(|entry| convert_entry(action, entry))
            .collect()
    }
}

fn convert_entry(action: Action, entry: DeltaData) -> Result<BookMessage, EnvelopeError> {
    let DeltaData {
        seq_id,
        prev_seq_id,
        bids,
        asks,
    } = entry;

    match action {
        Action::Snapshot => match prev_seq_id {
            Some(prev) if prev != SeqId::SNAPSHOT_PREV => Err(EnvelopeError::SnapshotPrev {
                seq_id,
                prev_seq_id: prev,
            }),
            _ => Ok(BookMessage::Snapshot { seq_id, bids, asks }),
        },
        Action::Update => {
            let prev_seq_id = prev_seq_id.ok_or(EnvelopeError::MissingPrevSeqId { seq_id })?;
            if seq_id <= prev_seq_id {
                return Err(EnvelopeError::NonIncreasing {
                    seq_id,
                    prev_seq_id,
                });
            }
            Ok(BookMessage::Update {
                seq_id,
                prev_seq_id,
                bids,
                asks,
            })
        }
    }
}
