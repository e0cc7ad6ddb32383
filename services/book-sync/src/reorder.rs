//! Bounded reorder window
//!
//! Collects admitted messages until `capacity` are held, then releases them
//! sorted by `seqId`. The final partial batch is released by [`ReorderWindow::finish`].
//! Arrival-order permutations inside one batch are fully repaired; a message
//! that arrives a batch too late is passed on as-is and the alignment machine
//! reports the resulting gap.

use std::num::NonZeroUsize;

use tracing::debug;

use crate::events::BookMessage;

/// Sort-and-release buffer of fixed capacity.
#[derive(Debug)]
pub struct ReorderWindow {
    capacity: NonZeroUsize,
    buffer: Vec<BookMessage>,
    flushes: u64,
}

impl ReorderWindow {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            buffer: Vec::with_capacity(capacity.get()),
            flushes: 0,
        }
    }

    /// Buffer a message. Returns the sorted batch once the window is full.
    pub fn push(&mut self, message: BookMessage) -> Option<Vec<BookMessage>> {
        self.buffer.push(message);
        if self.buffer.len() >= self.capacity.get() {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Release whatever is left at stream end.
    pub fn finish(&mut self) -> Option<Vec<BookMessage>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.flush())
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Messages currently held.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Batches released so far.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    fn flush(&mut self) -> Vec<BookMessage> {
        let mut batch = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.capacity.get()),
        );
        // Stable; seq ids are unique after dedup anyway.
        batch.sort_by_key(BookMessage::seq_id);
        self.flushes += 1;

        debug!(
            batch_size = batch.len(),
            first_seq_id = ?batch.first().map(BookMessage::seq_id),
            last_seq_id = ?batch.last().map(BookMessage::seq_id),
            flushes = self.flushes,
            "Reorder window flushed"
        );
        batch
    }
}
