//! Batched id allocation for bulk writes.

use std::sync::Arc;

use crate::error::Result;
use crate::ids::{IdGenerator, IdSequence};

/// Hands out pre-reserved, resettable runs of ids so bulk writers avoid a
/// generator round trip per record.
///
/// `reset()` rewinds to the start of the most recently obtained batch
/// without re-requesting ids, so a retried write burns no fresh
/// identifiers: `reset()` then `next()` replays the identical sequence.
pub struct BatchingIdSequence {
    source: Arc<IdGenerator>,
    batch_size: u64,
    batch_start: u64,
    cursor: u64,
    end: u64,
}

impl BatchingIdSequence {
    pub fn new(source: Arc<IdGenerator>, batch_size: u64) -> Self {
        assert!(batch_size > 0, "batch size must be non-zero");
        Self {
            source,
            batch_size,
            batch_start: 0,
            cursor: 0,
            end: 0,
        }
    }

    /// Returns the next unconsumed id, obtaining a fresh contiguous run
    /// from the backing generator when the current batch is exhausted.
    pub fn next(&mut self) -> Result<u64> {
        if self.cursor == self.end {
            self.batch_start = self.source.next_id_range(self.batch_size)?;
            self.cursor = self.batch_start;
            self.end = self.batch_start + self.batch_size;
        }
        let id = self.cursor;
        self.cursor += 1;
        Ok(id)
    }

    /// Rewinds to the start of the current batch.
    pub fn reset(&mut self) {
        self.cursor = self.batch_start;
    }
}

impl IdSequence for BatchingIdSequence {
    fn next(&mut self) -> Result<u64> {
        BatchingIdSequence::next(self)
    }
}
