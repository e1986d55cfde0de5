use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::record::Record;
use crate::segment::{Drain, Segment};

/// Why a [`GenerationBuffer`] refused a record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AppendRejected {
    /// The stream has not been allocated yet.
    Unallocated,
    /// The buffer is no longer accepting writes for this generation.
    Closed,
    /// The generation's record budget is used up.
    Throttled,
}

/// A [`Segment`] plus the write state of the generation it holds.
///
/// A buffer is opened when it becomes the current write target and closed
/// exactly once when it is handed to the consumer. Appends check the open
/// flag while holding their partition's lock, and [`close`](Self::close)
/// clears the flag before sealing each partition under that same lock, so
/// an append either completes before its partition is sealed or observes
/// the buffer as closed.
pub struct GenerationBuffer {
    segment: Segment,
    open: AtomicBool,
    generation: AtomicU64,
    budget: Option<usize>,
    admitted: AtomicUsize,
}

impl GenerationBuffer {
    /// Create a closed, empty buffer.
    pub fn new(partition_count: usize, block_size: usize, budget: Option<usize>) -> Self {
        Self {
            segment: Segment::new(partition_count, block_size),
            open: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            budget,
            admitted: AtomicUsize::new(0),
        }
    }

    /// Append `record` to the partition owned by `thread_index`.
    ///
    /// Returns the generation the record was written to.
    pub fn try_append(&self, thread_index: usize, record: &Record) -> Result<u64, AppendRejected> {
        let mut writer = self.segment.writer(thread_index);
        if !self.open.load(Ordering::Acquire) {
            return Err(AppendRejected::Closed);
        }
        if let Some(budget) = self.budget {
            if self.admitted.fetch_add(1, Ordering::AcqRel) >= budget {
                return Err(AppendRejected::Throttled);
            }
        }
        writer.append(record);
        Ok(self.generation.load(Ordering::Acquire))
    }

    /// Start accepting writes for `generation`.
    pub fn open(&self, generation: u64) {
        self.generation.store(generation, Ordering::Release);
        self.open.store(true, Ordering::Release);
    }

    /// Stop accepting writes and seal every partition.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        self.segment.close();
    }

    /// Forget all records, keeping the allocated blocks.
    ///
    /// Must only be called on a closed buffer that is not being drained.
    pub fn clear(&self) {
        debug_assert!(!self.is_open(), "cleared a buffer that accepts writes");
        self.segment.clear();
        self.admitted.store(0, Ordering::Release);
    }

    /// Drain the records of a closed buffer.
    pub fn drain(&self) -> Drain<'_> {
        debug_assert!(!self.is_open(), "drained a buffer that accepts writes");
        self.segment.drain()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Generation this buffer was last opened for.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn record_count(&self) -> usize {
        self.segment.record_count()
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }
}
