//! Thread-partitioned, append-only byte arena.
//!
//! A [`Segment`] owns one [`Partition`] per thread index. Each partition is
//! a chain of fixed-size blocks that only its owning producer appends to, so
//! producers with different indices never touch the same memory. Blocks are
//! kept across [`clear`](Segment::clear) and reused by later generations;
//! they are only freed when the segment is dropped.
//!
//! Which partitions were written in the current generation is tracked in a
//! lock-free bit set. Draining walks that set in ascending index order and
//! decodes each partition's records in the order they were appended.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

use crate::record::Record;

/// One fixed-size chunk of a partition's chain.
struct Block {
    bytes: Box<[u8]>,
    used: usize,
}

impl Block {
    fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
            used: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.used
    }
}

/// The memory and cursors owned by a single thread index.
#[derive(Default)]
struct Partition {
    /// Every block ever allocated for this index; only the first
    /// `active_blocks` belong to the current generation.
    blocks: Vec<Block>,
    active_blocks: usize,
    /// A write cursor was opened this generation.
    open: bool,
    /// Byte length fixed by [`Segment::close`].
    sealed_len: Option<usize>,
    record_count: usize,
    read: ReadCursor,
}

#[derive(Default, Clone, Copy)]
struct ReadCursor {
    block: usize,
    offset: usize,
    consumed: usize,
    finished: bool,
}

impl Partition {
    fn written_len(&self) -> usize {
        self.blocks[..self.active_blocks]
            .iter()
            .map(|block| block.used)
            .sum()
    }

    /// Return a block with at least `len` free bytes, moving to the next
    /// block in the chain (reused or newly allocated) when needed.
    fn block_for(&mut self, len: usize, block_size: usize) -> &mut Block {
        let needs_next = match self.active_blocks {
            0 => true,
            n => self.blocks[n - 1].remaining() < len,
        };
        if needs_next {
            if self.active_blocks == self.blocks.len() {
                self.blocks.push(Block::new(block_size));
            } else {
                self.blocks[self.active_blocks].used = 0;
            }
            self.active_blocks += 1;
        }
        &mut self.blocks[self.active_blocks - 1]
    }

    fn reset(&mut self) {
        for block in &mut self.blocks[..self.active_blocks] {
            block.used = 0;
        }
        self.active_blocks = 0;
        self.open = false;
        self.sealed_len = None;
        self.record_count = 0;
        self.read = ReadCursor::default();
    }

    /// Decode the next record, or `None` once the partition is exhausted or
    /// a corrupt record has been hit.
    fn next_record(&mut self, index: usize) -> Option<Result<Record, ()>> {
        if self.read.finished {
            return None;
        }
        let limit = self.sealed_len.unwrap_or_else(|| self.written_len());
        loop {
            if self.read.consumed >= limit || self.read.block >= self.active_blocks {
                self.read.finished = true;
                return None;
            }
            let block = &self.blocks[self.read.block];
            if self.read.offset >= block.used {
                self.read.block += 1;
                self.read.offset = 0;
                continue;
            }
            return match Record::decode(&block.bytes[..block.used], self.read.offset) {
                Ok((record, next)) => {
                    self.read.consumed += next - self.read.offset;
                    self.read.offset = next;
                    Some(Ok(record))
                }
                Err(err) => {
                    log::error!(
                        "Corrupt debug stream in partition {} (block {}): {}; skipping the rest of the partition",
                        index,
                        self.read.block,
                        err
                    );
                    self.read.finished = true;
                    Some(Err(()))
                }
            };
        }
    }
}

/// Lock-free set of thread indices that opened a partition this generation.
struct IndexSet {
    words: Box<[AtomicU64]>,
}

impl IndexSet {
    fn new(capacity: usize) -> Self {
        let words = capacity.div_ceil(64);
        Self {
            words: (0..words).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn insert(&self, index: usize) {
        self.words[index / 64].fetch_or(1 << (index % 64), Ordering::AcqRel);
    }

    fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Release);
        }
    }

    /// Members in ascending order.
    fn to_vec(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for (w, word) in self.words.iter().enumerate() {
            let mut bits = word.load(Ordering::Acquire);
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                out.push(w * 64 + bit);
                bits &= bits - 1;
            }
        }
        out
    }
}

/// Append-only arena partitioned by thread index.
pub struct Segment {
    partitions: Box<[CachePadded<Mutex<Partition>>]>,
    active: IndexSet,
    block_size: usize,
}

impl Segment {
    /// Create a segment with `partition_count` partitions whose blocks hold
    /// `block_size` bytes each.
    ///
    /// Panics if a block cannot hold the largest record.
    pub fn new(partition_count: usize, block_size: usize) -> Self {
        assert!(
            block_size >= Record::MAX_ENCODED_LEN,
            "block size {block_size} cannot hold a {} byte record",
            Record::MAX_ENCODED_LEN
        );
        Self {
            partitions: (0..partition_count)
                .map(|_| CachePadded::new(Mutex::new(Partition::default())))
                .collect(),
            active: IndexSet::new(partition_count),
            block_size,
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Lock the partition owned by `thread_index` for writing.
    ///
    /// Only the producer that owns the index and the consumer (while
    /// closing or clearing) ever take this lock, so it is uncontended in
    /// steady state. Panics if `thread_index` is out of range.
    pub fn writer(&self, thread_index: usize) -> PartitionWriter<'_> {
        assert!(
            thread_index < self.partitions.len(),
            "thread index {thread_index} out of range ({} partitions allocated)",
            self.partitions.len()
        );
        PartitionWriter {
            segment: self,
            index: thread_index,
            partition: self.partitions[thread_index].lock(),
        }
    }

    /// Append one record to the partition owned by `thread_index`.
    #[cfg(test)]
    pub fn append(&self, thread_index: usize, record: &Record) {
        self.writer(thread_index).append(record);
    }

    /// Seal every partition opened this generation.
    ///
    /// All partitions are locked in turn, so any append that was in flight
    /// when `close` started has completed by the time it returns.
    pub fn close(&self) {
        for slot in self.partitions.iter() {
            let mut partition = slot.lock();
            if partition.open && partition.sealed_len.is_none() {
                partition.sealed_len = Some(partition.written_len());
            }
        }
    }

    /// Reset every partition and the active index set, keeping blocks.
    pub fn clear(&self) {
        for slot in self.partitions.iter() {
            slot.lock().reset();
        }
        self.active.clear();
    }

    /// Thread indices that wrote this generation, ascending.
    #[cfg(test)]
    pub fn active_indices(&self) -> Vec<usize> {
        self.active.to_vec()
    }

    /// Total records appended this generation.
    pub fn record_count(&self) -> usize {
        self.active
            .to_vec()
            .into_iter()
            .map(|index| self.partitions[index].lock().record_count)
            .sum()
    }

    /// Number of blocks allocated across all partitions, in use or not.
    #[cfg(test)]
    pub fn allocated_blocks(&self) -> usize {
        self.partitions
            .iter()
            .map(|slot| slot.lock().blocks.len())
            .sum()
    }

    /// Start draining this generation's records.
    ///
    /// The returned iterator moves each partition's read cursor, so a second
    /// drain only yields what the first one left unread.
    pub fn drain(&self) -> Drain<'_> {
        Drain {
            segment: self,
            indices: self.active.to_vec().into_iter(),
            current: None,
            corrupt_partitions: 0,
        }
    }
}

/// Exclusive write access to one partition.
pub struct PartitionWriter<'a> {
    segment: &'a Segment,
    index: usize,
    partition: MutexGuard<'a, Partition>,
}

impl PartitionWriter<'_> {
    /// Copy `record` into the partition, opening its cursor on the first
    /// write of the generation.
    pub fn append(&mut self, record: &Record) {
        let partition = &mut *self.partition;
        if !partition.open {
            partition.open = true;
            self.segment.active.insert(self.index);
        }
        let len = record.encoded_len();
        let block = partition.block_for(len, self.segment.block_size);
        let used = block.used;
        block.used += record.encode_into(&mut block.bytes[used..]);
        partition.record_count += 1;
    }

    #[cfg(test)]
    pub(crate) fn append_raw(&mut self, bytes: &[u8]) {
        let partition = &mut *self.partition;
        if !partition.open {
            partition.open = true;
            self.segment.active.insert(self.index);
        }
        let block = partition.block_for(bytes.len(), self.segment.block_size);
        let used = block.used;
        block.bytes[used..used + bytes.len()].copy_from_slice(bytes);
        block.used += bytes.len();
    }
}

/// One-shot iterator over a segment's records.
///
/// Yields partitions in ascending thread-index order and each partition's
/// records in append order. A corrupt record ends its partition early; the
/// error is logged and counted, and draining continues with the next
/// partition.
pub struct Drain<'a> {
    segment: &'a Segment,
    indices: std::vec::IntoIter<usize>,
    current: Option<(usize, MutexGuard<'a, Partition>)>,
    corrupt_partitions: usize,
}

impl Drain<'_> {
    /// Partitions abandoned because of a decode error so far.
    pub fn corrupt_partitions(&self) -> usize {
        self.corrupt_partitions
    }
}

impl Iterator for Drain<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if self.current.is_none() {
                let index = self.indices.next()?;
                self.current = Some((index, self.segment.partitions[index].lock()));
            }
            let (index, partition) = self.current.as_mut()?;
            match partition.next_record(*index) {
                Some(Ok(record)) => return Some(record),
                Some(Err(())) => {
                    self.corrupt_partitions += 1;
                    self.current = None;
                }
                None => self.current = None,
            }
        }
    }
}
