use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::generation::{AppendRejected, GenerationBuffer};
use crate::record::Record;

/// Number of generation buffers in the rotation.
pub const SLOT_COUNT: usize = 3;

/// Role a generation buffer plays in the rotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Accepting producer writes.
    Current,
    /// Cleared and waiting to become current.
    Available,
    /// Closed and owned by the consumer.
    Processing,
}

impl Role {
    fn offset(self) -> u64 {
        match self {
            Role::Current => 0,
            Role::Available => 1,
            Role::Processing => 2,
        }
    }
}

/// Three generation buffers rotating through the current, available and
/// processing roles.
///
/// Roles are derived from a single rotation counter `r`: the current buffer
/// is slot `r % 3`, available is `(r + 1) % 3` and processing is
/// `(r + 2) % 3`. Bumping `r` moves every buffer to its next role in one
/// atomic step: available becomes current, current becomes processing and
/// processing becomes available.
///
/// Appends may come from any thread. [`rotate`](Self::rotate) and draining
/// the processing buffer must happen on one consumer at a time.
pub struct StreamRotation {
    slots: OnceLock<[GenerationBuffer; SLOT_COUNT]>,
    rotation: AtomicU64,
}

impl StreamRotation {
    /// Create an unallocated rotation.
    pub fn new() -> Self {
        Self {
            slots: OnceLock::new(),
            rotation: AtomicU64::new(0),
        }
    }

    /// Allocate the three buffers and open the first one for writing.
    ///
    /// Returns `false` without touching anything if already allocated.
    pub fn allocate(
        &self,
        partition_count: usize,
        block_size: usize,
        budget: Option<usize>,
    ) -> bool {
        let mut created = false;
        self.slots.get_or_init(|| {
            created = true;
            let slots = [(); SLOT_COUNT]
                .map(|_| GenerationBuffer::new(partition_count, block_size, budget));
            let generation = self.rotation.load(Ordering::Acquire);
            slots[slot_index(generation, Role::Current)].open(generation);
            slots
        });
        created
    }

    pub fn is_allocated(&self) -> bool {
        self.slots.get().is_some()
    }

    /// Number of rotations performed so far; also the generation id of the
    /// current buffer.
    pub fn rotation_count(&self) -> u64 {
        self.rotation.load(Ordering::Acquire)
    }

    /// The buffer currently playing `role`.
    pub fn buffer(&self, role: Role) -> Option<&GenerationBuffer> {
        let slots = self.slots.get()?;
        Some(&slots[slot_index(self.rotation_count(), role)])
    }

    pub fn current(&self) -> Option<&GenerationBuffer> {
        self.buffer(Role::Current)
    }

    #[cfg(test)]
    pub fn available(&self) -> Option<&GenerationBuffer> {
        self.buffer(Role::Available)
    }

    pub fn processing(&self) -> Option<&GenerationBuffer> {
        self.buffer(Role::Processing)
    }

    /// Append `record` to whichever buffer is current.
    ///
    /// A producer that resolved a buffer just before it was rotated out
    /// finds it closed and retries against the new current buffer, so the
    /// record lands in exactly one generation. Returns that generation.
    pub fn append(&self, thread_index: usize, record: &Record) -> Result<u64, AppendRejected> {
        let slots = self.slots.get().ok_or(AppendRejected::Unallocated)?;
        let mut result = Err(AppendRejected::Closed);
        for _ in 0..SLOT_COUNT {
            let current = &slots[slot_index(self.rotation_count(), Role::Current)];
            result = current.try_append(thread_index, record);
            if result != Err(AppendRejected::Closed) {
                break;
            }
        }
        result
    }

    /// Advance every buffer to its next role.
    ///
    /// The available buffer is opened before the roles change, so writers
    /// always find an open current buffer. After the switch the previously
    /// drained buffer is cleared for reuse and the outgoing current buffer
    /// is closed and becomes readable.
    ///
    /// Returns `false` if the rotation is not allocated.
    pub fn rotate(&self) -> bool {
        let Some(slots) = self.slots.get() else {
            return false;
        };
        let rotation = self.rotation.load(Ordering::Acquire);
        let next = rotation + 1;

        slots[slot_index(rotation, Role::Available)].open(next);
        self.rotation.store(next, Ordering::Release);

        slots[slot_index(next, Role::Available)].clear();
        slots[slot_index(next, Role::Processing)].close();

        log::trace!("Debug stream rotated to generation {}", next);
        true
    }
}

impl Default for StreamRotation {
    fn default() -> Self {
        Self::new()
    }
}

fn slot_index(rotation: u64, role: Role) -> usize {
    ((rotation + role.offset()) % SLOT_COUNT as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Line;

    fn line(x: f32) -> Record {
        Record::Line(Line {
            start: [x, 0.0, 0.0],
            end: [0.0; 3],
            color: [1.0; 4],
        })
    }

    fn allocated() -> StreamRotation {
        let rotation = StreamRotation::new();
        assert!(rotation.allocate(3, 1024, None));
        rotation
    }

    fn ptr(buffer: Option<&GenerationBuffer>) -> *const GenerationBuffer {
        buffer.map_or(std::ptr::null(), |b| b as *const _)
    }

    #[test]
    fn test_unallocated_rotation() {
        let rotation = StreamRotation::new();
        assert!(!rotation.is_allocated());
        assert!(!rotation.rotate());
        assert_eq!(
            rotation.append(0, &line(0.0)),
            Err(AppendRejected::Unallocated)
        );
        assert!(rotation.current().is_none());
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let rotation = allocated();
        rotation.append(0, &line(1.0)).unwrap();
        assert!(!rotation.allocate(8, 4096, None));
        assert_eq!(rotation.current().map(|b| b.record_count()), Some(1));
        assert_eq!(
            rotation.current().map(|b| b.segment().partition_count()),
            Some(3)
        );
    }

    #[test]
    fn test_roles_are_distinct_and_rotate() {
        let rotation = allocated();
        for _ in 0..6 {
            let current = ptr(rotation.current());
            let available = ptr(rotation.available());
            let processing = ptr(rotation.processing());
            assert_ne!(current, available);
            assert_ne!(current, processing);
            assert_ne!(available, processing);

            rotation.rotate();
            assert_eq!(ptr(rotation.current()), available);
            assert_eq!(ptr(rotation.processing()), current);
            assert_eq!(ptr(rotation.available()), processing);
        }
    }

    #[test]
    fn test_only_current_is_open() {
        let rotation = allocated();
        for _ in 0..4 {
            assert_eq!(rotation.current().map(|b| b.is_open()), Some(true));
            assert_eq!(rotation.available().map(|b| b.is_open()), Some(false));
            assert_eq!(rotation.processing().map(|b| b.is_open()), Some(false));
            rotation.rotate();
        }
    }

    #[test]
    fn test_rotate_hands_writes_to_processing() {
        let rotation = allocated();
        assert_eq!(rotation.append(1, &line(1.0)), Ok(0));
        assert_eq!(rotation.append(2, &line(2.0)), Ok(0));
        rotation.rotate();

        assert_eq!(rotation.append(1, &line(3.0)), Ok(1));
        let processing = rotation.processing().unwrap();
        assert_eq!(processing.generation(), 0);
        assert_eq!(processing.drain().count(), 2);
        assert_eq!(rotation.current().map(|b| b.record_count()), Some(1));
    }

    #[test]
    fn test_drained_buffer_is_cleared_on_next_rotation() {
        let rotation = allocated();
        rotation.append(0, &line(1.0)).unwrap();
        rotation.rotate();
        rotation.rotate();
        // the generation-0 buffer is now available and must be empty
        assert_eq!(rotation.available().map(|b| b.record_count()), Some(0));
        assert_eq!(rotation.processing().map(|b| b.drain().count()), Some(0));
    }

    #[test]
    fn test_empty_rotations_do_not_leak_partitions() {
        let rotation = allocated();
        for _ in 0..10 {
            rotation.rotate();
            let processing = rotation.processing().unwrap();
            assert!(processing.segment().active_indices().is_empty());
            assert_eq!(processing.drain().count(), 0);
            assert_eq!(processing.segment().allocated_blocks(), 0);
        }
        assert_eq!(rotation.rotation_count(), 10);
    }
}
